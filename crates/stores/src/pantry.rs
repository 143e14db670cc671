use std::sync::{Arc, PoisonError, RwLock};

use larder_sync_core::{normalize_name, Category, Ingredient, SyncRegion};
use uuid::Uuid;

use crate::hook::PushHandle;
use crate::local::{load_slot, save_slot, LocalStore};

const SLOT: &str = "pantry";

/// Pantry inventory: what the household has on hand. Rows stay sorted by
/// category, then normalized name.
pub struct PantryStore {
    local: Arc<dyn LocalStore>,
    push: PushHandle,
    items: RwLock<Vec<Ingredient>>,
}

impl PantryStore {
    pub fn open(local: Arc<dyn LocalStore>, push: PushHandle) -> Self {
        let mut items: Vec<Ingredient> = match load_slot(local.as_ref(), SLOT) {
            Ok(items) => items.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(%error, slot = SLOT, "discarding unreadable pantry state");
                Vec::new()
            }
        };
        sort_items(&mut items);
        Self {
            local,
            push,
            items: RwLock::new(items),
        }
    }

    #[must_use]
    pub fn items(&self) -> Vec<Ingredient> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn item(&self, id: Uuid) -> Option<Ingredient> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub fn add_item(
        &self,
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        category: Category,
    ) -> Ingredient {
        let item = Ingredient::new(name, quantity, unit, category);
        {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            items.push(item.clone());
            sort_items(&mut items);
            self.persist(&items);
        }
        self.push.notify(SyncRegion::Pantry);
        item
    }

    /// Replaces the row with the same id. Returns false when no such row
    /// exists, in which case nothing is persisted or pushed.
    pub fn update_item(&self, updated: Ingredient) -> bool {
        let found = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            match items.iter_mut().find(|item| item.id == updated.id) {
                Some(slot) => {
                    *slot = updated;
                    sort_items(&mut items);
                    self.persist(&items);
                    true
                }
                None => false,
            }
        };
        if found {
            self.push.notify(SyncRegion::Pantry);
        }
        found
    }

    pub fn remove_item(&self, id: Uuid) -> bool {
        let removed = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            let before = items.len();
            items.retain(|item| item.id != id);
            let removed = items.len() != before;
            if removed {
                self.persist(&items);
            }
            removed
        };
        if removed {
            self.push.notify(SyncRegion::Pantry);
        }
        removed
    }

    /// Bulk insert, one push for the whole batch. Used when checked-off
    /// shopping rows land in the pantry.
    pub fn restock(&self, incoming: Vec<Ingredient>) {
        if incoming.is_empty() {
            return;
        }
        {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            items.extend(incoming);
            sort_items(&mut items);
            self.persist(&items);
        }
        self.push.notify(SyncRegion::Pantry);
    }

    /// Applies a remote snapshot's pantry slice: wholesale replacement,
    /// persisted but never pushed back (a push here would echo forever).
    pub fn replace_from_remote(&self, mut incoming: Vec<Ingredient>) {
        sort_items(&mut incoming);
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        *items = incoming;
        self.persist(&items);
    }

    fn persist(&self, items: &[Ingredient]) {
        if let Err(error) = save_slot(self.local.as_ref(), SLOT, &items) {
            tracing::warn!(%error, slot = SLOT, "failed to persist pantry state");
        }
    }
}

fn sort_items(items: &mut [Ingredient]) {
    items.sort_by_cached_key(|item| (item.category, normalize_name(&item.name)));
}

#[cfg(test)]
mod tests {
    use crate::local::MemoryLocalStore;

    use super::*;

    fn store() -> (PantryStore, tokio::sync::mpsc::UnboundedReceiver<SyncRegion>) {
        let (push, rx) = PushHandle::channel();
        (PantryStore::open(Arc::new(MemoryLocalStore::new()), push), rx)
    }

    #[test]
    fn add_update_remove_round_trip() {
        let (pantry, mut rx) = store();

        let added = pantry.add_item("Flour", 1.0, "kg", Category::Pantry);
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Pantry));

        let mut updated = added.clone();
        updated.quantity = 2.5;
        assert!(pantry.update_item(updated));
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Pantry));
        assert_eq!(pantry.item(added.id).expect("row").quantity, 2.5);

        assert!(pantry.remove_item(added.id));
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Pantry));
        assert!(pantry.items().is_empty());
    }

    #[test]
    fn update_of_unknown_row_does_not_push() {
        let (pantry, mut rx) = store();
        let ghost = Ingredient::new("ghost", 1.0, "kg", Category::Other);
        assert!(!pantry.update_item(ghost));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn items_stay_sorted_by_category_then_name() {
        let (pantry, _rx) = store();
        pantry.add_item("zucchini", 2.0, "pc", Category::Produce);
        pantry.add_item("detergent", 1.0, "pc", Category::Household);
        pantry.add_item("Apples", 4.0, "pc", Category::Produce);

        let names: Vec<String> = pantry.items().into_iter().map(|item| item.name).collect();
        assert_eq!(names, vec!["Apples", "zucchini", "detergent"]);
    }

    #[test]
    fn restock_pushes_once_for_the_batch() {
        let (pantry, mut rx) = store();
        pantry.restock(vec![
            Ingredient::new("milk", 1.0, "l", Category::Dairy),
            Ingredient::new("eggs", 12.0, "pc", Category::Dairy),
        ]);

        assert_eq!(rx.try_recv(), Ok(SyncRegion::Pantry));
        assert!(rx.try_recv().is_err());
        assert_eq!(pantry.items().len(), 2);
    }

    #[test]
    fn restock_with_nothing_is_a_no_op() {
        let (pantry, mut rx) = store();
        pantry.restock(Vec::new());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn replace_from_remote_does_not_push() {
        let (pantry, mut rx) = store();
        pantry.replace_from_remote(vec![Ingredient::new("rice", 5.0, "kg", Category::Pantry)]);

        assert!(rx.try_recv().is_err());
        assert_eq!(pantry.items().len(), 1);
    }

    #[test]
    fn state_survives_reopen_from_same_slots() {
        let local: Arc<MemoryLocalStore> = Arc::new(MemoryLocalStore::new());

        let pantry = PantryStore::open(local.clone(), PushHandle::disconnected());
        pantry.add_item("butter", 250.0, "g", Category::Dairy);
        drop(pantry);

        let reopened = PantryStore::open(local, PushHandle::disconnected());
        assert_eq!(reopened.items().len(), 1);
        assert_eq!(reopened.items()[0].name, "butter");
    }
}
