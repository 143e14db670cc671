use std::sync::{Arc, PoisonError, RwLock};

use larder_sync_core::{MealPlanEntry, MealSlot, SyncRegion};
use time::Date;
use uuid::Uuid;

use crate::hook::PushHandle;
use crate::local::{load_slot, save_slot, LocalStore};

const SLOT: &str = "meal_plans";

/// Planned meals on the calendar, kept sorted by day then slot.
pub struct MealPlanStore {
    local: Arc<dyn LocalStore>,
    push: PushHandle,
    entries: RwLock<Vec<MealPlanEntry>>,
}

impl MealPlanStore {
    pub fn open(local: Arc<dyn LocalStore>, push: PushHandle) -> Self {
        let mut entries: Vec<MealPlanEntry> = match load_slot(local.as_ref(), SLOT) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(%error, slot = SLOT, "discarding unreadable meal plan state");
                Vec::new()
            }
        };
        sort_entries(&mut entries);
        Self {
            local,
            push,
            entries: RwLock::new(entries),
        }
    }

    #[must_use]
    pub fn entries(&self) -> Vec<MealPlanEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn entries_for(&self, date: Date) -> Vec<MealPlanEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.date == date)
            .cloned()
            .collect()
    }

    pub fn plan(&self, date: Date, slot: MealSlot, title: impl Into<String>) -> MealPlanEntry {
        self.insert(MealPlanEntry::new(date, slot, title))
    }

    /// Plans a meal backed by a saved recipe.
    pub fn plan_recipe(
        &self,
        date: Date,
        slot: MealSlot,
        title: impl Into<String>,
        recipe_id: impl Into<String>,
    ) -> MealPlanEntry {
        self.insert(MealPlanEntry::new(date, slot, title).with_recipe(recipe_id))
    }

    /// Replaces the entry with the same id. Returns false when no such
    /// entry exists, in which case nothing is persisted or pushed.
    pub fn update(&self, updated: MealPlanEntry) -> bool {
        let found = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            match entries.iter_mut().find(|entry| entry.id == updated.id) {
                Some(slot) => {
                    *slot = updated;
                    sort_entries(&mut entries);
                    self.persist(&entries);
                    true
                }
                None => false,
            }
        };
        if found {
            self.push.notify(SyncRegion::MealPlans);
        }
        found
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let removed = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            let removed = entries.len() != before;
            if removed {
                self.persist(&entries);
            }
            removed
        };
        if removed {
            self.push.notify(SyncRegion::MealPlans);
        }
        removed
    }

    /// Applies a remote snapshot's meal plan slice: wholesale
    /// replacement, persisted, never pushed back.
    pub fn replace_from_remote(&self, mut incoming: Vec<MealPlanEntry>) {
        sort_entries(&mut incoming);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *entries = incoming;
        self.persist(&entries);
    }

    fn insert(&self, entry: MealPlanEntry) -> MealPlanEntry {
        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.push(entry.clone());
            sort_entries(&mut entries);
            self.persist(&entries);
        }
        self.push.notify(SyncRegion::MealPlans);
        entry
    }

    fn persist(&self, entries: &[MealPlanEntry]) {
        if let Err(error) = save_slot(self.local.as_ref(), SLOT, &entries) {
            tracing::warn!(%error, slot = SLOT, "failed to persist meal plan state");
        }
    }
}

fn sort_entries(entries: &mut [MealPlanEntry]) {
    entries.sort_by_key(|entry| (entry.date, entry.slot));
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::local::MemoryLocalStore;

    use super::*;

    fn store() -> (
        MealPlanStore,
        tokio::sync::mpsc::UnboundedReceiver<SyncRegion>,
    ) {
        let (push, rx) = PushHandle::channel();
        (
            MealPlanStore::open(Arc::new(MemoryLocalStore::new()), push),
            rx,
        )
    }

    #[test]
    fn plan_and_remove_round_trip() {
        let (plans, mut rx) = store();

        let entry = plans.plan(date!(2025 - 03 - 10), MealSlot::Dinner, "Chili");
        assert_eq!(rx.try_recv(), Ok(SyncRegion::MealPlans));

        assert!(plans.remove(entry.id));
        assert_eq!(rx.try_recv(), Ok(SyncRegion::MealPlans));
        assert!(plans.entries().is_empty());

        assert!(!plans.remove(entry.id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn entries_sort_by_day_then_slot() {
        let (plans, _rx) = store();
        plans.plan(date!(2025 - 03 - 11), MealSlot::Breakfast, "Oats");
        plans.plan(date!(2025 - 03 - 10), MealSlot::Dinner, "Chili");
        plans.plan(date!(2025 - 03 - 10), MealSlot::Breakfast, "Eggs");

        let titles: Vec<String> = plans.entries().into_iter().map(|entry| entry.title).collect();
        assert_eq!(titles, vec!["Eggs", "Chili", "Oats"]);
    }

    #[test]
    fn entries_for_filters_one_day() {
        let (plans, _rx) = store();
        plans.plan(date!(2025 - 03 - 10), MealSlot::Dinner, "Chili");
        plans.plan(date!(2025 - 03 - 11), MealSlot::Dinner, "Tacos");

        let day = plans.entries_for(date!(2025 - 03 - 10));
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].title, "Chili");
    }

    #[test]
    fn update_moves_an_entry_and_resorts() {
        let (plans, mut rx) = store();
        let entry = plans.plan(date!(2025 - 03 - 10), MealSlot::Dinner, "Chili");
        plans.plan(date!(2025 - 03 - 11), MealSlot::Lunch, "Soup");
        while rx.try_recv().is_ok() {}

        let mut moved = entry.clone();
        moved.date = date!(2025 - 03 - 12);
        moved.title = "Leftover chili".to_owned();
        assert!(plans.update(moved));
        assert_eq!(rx.try_recv(), Ok(SyncRegion::MealPlans));

        let titles: Vec<String> = plans.entries().into_iter().map(|entry| entry.title).collect();
        assert_eq!(titles, vec!["Soup", "Leftover chili"]);

        let ghost = MealPlanEntry::new(date!(2025 - 03 - 13), MealSlot::Snack, "Ghost");
        assert!(!plans.update(ghost));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn plan_recipe_links_the_recipe_id() {
        let (plans, _rx) = store();
        let entry = plans.plan_recipe(
            date!(2025 - 03 - 12),
            MealSlot::Lunch,
            "Pesto Pasta",
            "pesto-pasta",
        );
        assert_eq!(entry.recipe_id.as_deref(), Some("pesto-pasta"));
    }

    #[test]
    fn replace_from_remote_does_not_push() {
        let (plans, mut rx) = store();
        plans.replace_from_remote(vec![MealPlanEntry::new(
            date!(2025 - 03 - 10),
            MealSlot::Dinner,
            "Chili",
        )]);

        assert!(rx.try_recv().is_err());
        assert_eq!(plans.entries().len(), 1);
    }

    #[test]
    fn state_survives_reopen_from_same_slots() {
        let local: Arc<MemoryLocalStore> = Arc::new(MemoryLocalStore::new());

        let plans = MealPlanStore::open(local.clone(), PushHandle::disconnected());
        plans.plan(date!(2025 - 03 - 10), MealSlot::Dinner, "Chili");
        drop(plans);

        let reopened = MealPlanStore::open(local, PushHandle::disconnected());
        assert_eq!(reopened.entries().len(), 1);
    }
}
