use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Grocery category used to group and order pantry and shopping rows.
///
/// The declaration order is the fixed sort order used everywhere:
/// produce < bakery < dairy < meat < frozen < pantry < beverages <
/// household < other. Category names the remote document carries that we
/// do not recognize collapse into `Other` and therefore sort last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Category {
    Produce,
    Bakery,
    Dairy,
    Meat,
    Frozen,
    Pantry,
    Beverages,
    Household,
    #[default]
    Other,
}

impl Category {
    /// All categories in sort order.
    pub const ORDERED: [Self; 9] = [
        Self::Produce,
        Self::Bakery,
        Self::Dairy,
        Self::Meat,
        Self::Frozen,
        Self::Pantry,
        Self::Beverages,
        Self::Household,
        Self::Other,
    ];

    /// Parses a category name case-insensitively; unknown names yield `Other`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "produce" => Self::Produce,
            "bakery" => Self::Bakery,
            "dairy" => Self::Dairy,
            "meat" => Self::Meat,
            "frozen" => Self::Frozen,
            "pantry" => Self::Pantry,
            "beverages" => Self::Beverages,
            "household" => Self::Household,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Produce => "produce",
            Self::Bakery => "bakery",
            Self::Dairy => "dairy",
            Self::Meat => "meat",
            Self::Frozen => "frozen",
            Self::Pantry => "pantry",
            Self::Beverages => "beverages",
            Self::Household => "household",
            Self::Other => "other",
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
