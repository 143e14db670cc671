use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root UUID namespace for the Larder platform.
/// Computed as UUID5(DNS, "larder.app").
pub fn larder_namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"larder.app")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HouseholdId(pub Uuid);

impl HouseholdId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HouseholdId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for HouseholdId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for HouseholdId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifies which remote document a device reads and writes.
///
/// Every signed-in user has exactly one partition at a time: their
/// household's shared partition when they belong to one, otherwise a
/// personal partition derived deterministically from their user id so
/// the same user lands on the same document from any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum PartitionKey {
    Personal(Uuid),
    Household(HouseholdId),
}

impl PartitionKey {
    /// Deterministic personal partition for a user.
    /// Formula: UUID5(LARDER_NS, user_id)
    #[must_use]
    pub fn personal(user_id: &str) -> Self {
        Self::Personal(Uuid::new_v5(&larder_namespace(), user_id.as_bytes()))
    }

    #[must_use]
    pub fn household(id: HouseholdId) -> Self {
        Self::Household(id)
    }

    #[must_use]
    pub fn is_household(&self) -> bool {
        matches!(self, Self::Household(_))
    }

    /// Remote document identifier for this partition. Stable across
    /// devices and sessions: two devices on the same partition always
    /// address the same document.
    #[must_use]
    pub fn document_id(&self) -> String {
        self.to_string()
    }
}

impl Display for PartitionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Personal(id) => write!(f, "personal:{id}"),
            Self::Household(id) => write!(f, "household:{id}"),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PartitionParseError {
    #[error("missing partition kind prefix")]
    MissingPrefix,
    #[error("unknown partition kind: {0}")]
    UnknownKind(String),
    #[error("invalid partition id")]
    InvalidId,
}

impl FromStr for PartitionKey {
    type Err = PartitionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or(PartitionParseError::MissingPrefix)?;
        let id = Uuid::parse_str(id).map_err(|_| PartitionParseError::InvalidId)?;
        match kind {
            "personal" => Ok(Self::Personal(id)),
            "household" => Ok(Self::Household(HouseholdId(id))),
            other => Err(PartitionParseError::UnknownKind(other.to_owned())),
        }
    }
}
