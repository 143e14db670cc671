use std::sync::Arc;

use larder_sync_auth::Identity;
use larder_sync_core::PartitionKey;
use larder_sync_remote::{DirectoryError, HouseholdDirectory};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("partition resolution failed: {0}")]
    Lookup(#[from] DirectoryError),
}

/// Resolves which remote partition an identity syncs against and caches
/// the answer for the life of the session.
///
/// Household membership wins; a user without one gets a personal
/// partition derived from their user id. The cache is keyed by user, so
/// an account switch naturally re-resolves while repeated session starts
/// for the same user skip the directory.
pub struct HouseholdResolver {
    directory: Arc<dyn HouseholdDirectory>,
    cached: Option<(String, PartitionKey)>,
}

impl HouseholdResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn HouseholdDirectory>) -> Self {
        Self {
            directory,
            cached: None,
        }
    }

    /// The partition for `identity`, looked up at most once per user
    /// until [`Self::invalidate`] is called.
    pub async fn resolve(&mut self, identity: &Identity) -> Result<PartitionKey, ResolutionError> {
        if let Some((user_id, partition)) = &self.cached {
            if user_id == &identity.user_id {
                return Ok(*partition);
            }
        }

        let partition = match self.directory.household_for(&identity.user_id).await? {
            Some(household) => PartitionKey::household(household),
            None => PartitionKey::personal(&identity.user_id),
        };
        self.cached = Some((identity.user_id.clone(), partition));
        Ok(partition)
    }

    /// Caches and returns the personal partition. Used when the
    /// directory is unreachable so sign-in never blocks on it; the
    /// fallback sticks until the next explicit refresh.
    pub fn fall_back_to_personal(&mut self, identity: &Identity) -> PartitionKey {
        let partition = PartitionKey::personal(&identity.user_id);
        self.cached = Some((identity.user_id.clone(), partition));
        partition
    }

    /// The cached partition, if a resolve or fallback has happened.
    #[must_use]
    pub fn cached(&self) -> Option<PartitionKey> {
        self.cached.as_ref().map(|(_, partition)| *partition)
    }

    /// Drops the cached answer; the next resolve hits the directory.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use larder_sync_core::HouseholdId;
    use larder_sync_remote::MemoryDirectory;

    use super::*;

    fn identity(user_id: &str) -> Identity {
        Identity::new(user_id)
    }

    #[tokio::test]
    async fn member_resolves_household_partition() {
        let directory = Arc::new(MemoryDirectory::new());
        let household = HouseholdId::new();
        directory.assign("user-1", household);

        let mut resolver = HouseholdResolver::new(directory);
        let partition = resolver
            .resolve(&identity("user-1"))
            .await
            .expect("resolve");
        assert_eq!(partition, PartitionKey::household(household));
        assert_eq!(resolver.cached(), Some(partition));
    }

    #[tokio::test]
    async fn solo_user_resolves_personal_partition() {
        let directory = Arc::new(MemoryDirectory::new());
        let mut resolver = HouseholdResolver::new(directory);
        assert_eq!(resolver.cached(), None);

        let partition = resolver
            .resolve(&identity("user-1"))
            .await
            .expect("resolve");
        assert_eq!(partition, PartitionKey::personal("user-1"));
    }

    #[tokio::test]
    async fn repeated_resolves_hit_the_directory_once() {
        let directory = Arc::new(MemoryDirectory::new());
        let mut resolver = HouseholdResolver::new(directory.clone());

        let first = resolver
            .resolve(&identity("user-1"))
            .await
            .expect("resolve");
        let second = resolver
            .resolve(&identity("user-1"))
            .await
            .expect("resolve");
        assert_eq!(first, second);
        assert_eq!(directory.lookup_count(), 1);

        resolver.invalidate();
        assert_eq!(resolver.cached(), None);
        resolver
            .resolve(&identity("user-1"))
            .await
            .expect("resolve");
        assert_eq!(directory.lookup_count(), 2);
    }

    #[tokio::test]
    async fn account_switch_bypasses_the_cache() {
        let directory = Arc::new(MemoryDirectory::new());
        let household = HouseholdId::new();
        directory.assign("user-2", household);

        let mut resolver = HouseholdResolver::new(directory.clone());
        let first = resolver
            .resolve(&identity("user-1"))
            .await
            .expect("resolve");
        let second = resolver
            .resolve(&identity("user-2"))
            .await
            .expect("resolve");

        assert_eq!(first, PartitionKey::personal("user-1"));
        assert_eq!(second, PartitionKey::household(household));
        assert_eq!(directory.lookup_count(), 2);
    }

    #[tokio::test]
    async fn offline_lookup_errors_and_fallback_is_cached() {
        let directory = Arc::new(MemoryDirectory::new());
        directory.set_offline(true);

        let mut resolver = HouseholdResolver::new(directory.clone());
        let kim = identity("user-1");
        let error = resolver.resolve(&kim).await.expect_err("directory down");
        assert!(matches!(error, ResolutionError::Lookup(_)));

        let fallback = resolver.fall_back_to_personal(&kim);
        assert_eq!(fallback, PartitionKey::personal("user-1"));

        // The fallback answer sticks even once the directory is back.
        directory.set_offline(false);
        directory.assign("user-1", HouseholdId::new());
        let resolved = resolver.resolve(&kim).await.expect("cached");
        assert_eq!(resolved, fallback);

        resolver.invalidate();
        let refreshed = resolver.resolve(&kim).await.expect("fresh lookup");
        assert!(refreshed.is_household());
    }
}
