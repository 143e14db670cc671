use std::sync::{Arc, PoisonError, RwLock};

use larder_sync_core::{
    normalize_name, normalize_unit, Category, ShoppingItem, ShoppingList, SyncRegion,
};
use uuid::Uuid;

use crate::hook::PushHandle;
use crate::local::{load_slot, save_slot, LocalStore};

const SLOT: &str = "shopping";
const DEFAULT_LIST_NAME: &str = "Shopping";

/// Shopping lists. The first list is the active one: it is what gets
/// synced (the remote document carries a single item collection) and what
/// item-level operations target. Remaining lists are local archives.
pub struct ShoppingStore {
    local: Arc<dyn LocalStore>,
    push: PushHandle,
    lists: RwLock<Vec<ShoppingList>>,
}

impl ShoppingStore {
    pub fn open(local: Arc<dyn LocalStore>, push: PushHandle) -> Self {
        let lists: Vec<ShoppingList> = match load_slot(local.as_ref(), SLOT) {
            Ok(lists) => lists.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(%error, slot = SLOT, "discarding unreadable shopping state");
                Vec::new()
            }
        };
        Self {
            local,
            push,
            lists: RwLock::new(lists),
        }
    }

    #[must_use]
    pub fn lists(&self) -> Vec<ShoppingList> {
        self.lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn active_list(&self) -> Option<ShoppingList> {
        self.lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
    }

    /// Creates a new list at the end of the collection. The first list
    /// ever created becomes the active one and starts syncing.
    pub fn create_list(&self, name: impl Into<String>) -> ShoppingList {
        let list = ShoppingList::new(name);
        let became_active = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            lists.push(list.clone());
            self.persist(&lists);
            lists.len() == 1
        };
        if became_active {
            self.push.notify(SyncRegion::Shopping);
        }
        list
    }

    /// Moves a list to the front, making it the active one.
    pub fn set_active(&self, id: Uuid) -> bool {
        let changed = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            match lists.iter().position(|list| list.id == id) {
                Some(0) => false,
                Some(index) => {
                    let list = lists.remove(index);
                    lists.insert(0, list);
                    self.persist(&lists);
                    true
                }
                None => return false,
            }
        };
        if changed {
            self.push.notify(SyncRegion::Shopping);
        }
        true
    }

    /// Removes a list. Pushes only when the active list was removed,
    /// since archives never leave this device.
    pub fn remove_list(&self, id: Uuid) -> bool {
        let (removed, was_active) = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            match lists.iter().position(|list| list.id == id) {
                Some(index) => {
                    lists.remove(index);
                    self.persist(&lists);
                    (true, index == 0)
                }
                None => (false, false),
            }
        };
        if was_active {
            self.push.notify(SyncRegion::Shopping);
        }
        removed
    }

    /// Adds an item to the active list, creating a default list first if
    /// none exists. An existing row with the same normalized name and
    /// unit absorbs the quantity instead of duplicating; absorbing also
    /// unchecks the row, since it needs buying again.
    pub fn add_item(
        &self,
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        category: Category,
    ) -> ShoppingItem {
        let name = name.into();
        let unit = unit.into();
        let result = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            if lists.is_empty() {
                lists.push(ShoppingList::new(DEFAULT_LIST_NAME));
            }
            let list = &mut lists[0];

            let key = (normalize_name(&name), normalize_unit(&unit));
            let result = match list
                .items
                .iter_mut()
                .find(|item| (normalize_name(&item.name), normalize_unit(&item.unit)) == key)
            {
                Some(existing) => {
                    existing.quantity += quantity;
                    existing.checked = false;
                    existing.clone()
                }
                None => {
                    let item = ShoppingItem::new(name, quantity, unit, category);
                    list.items.push(item.clone());
                    item
                }
            };
            sort_items(&mut list.items);
            self.persist(&lists);
            result
        };
        self.push.notify(SyncRegion::Shopping);
        result
    }

    /// Replaces the row with the same id on whichever list holds it.
    /// Rows on archive lists update locally without pushing.
    pub fn update_item(&self, updated: ShoppingItem) -> bool {
        let (found, on_active) = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            let position = lists.iter().enumerate().find_map(|(list_index, list)| {
                list.items
                    .iter()
                    .position(|item| item.id == updated.id)
                    .map(|item_index| (list_index, item_index))
            });
            match position {
                Some((list_index, item_index)) => {
                    let list = &mut lists[list_index];
                    list.items[item_index] = updated;
                    sort_items(&mut list.items);
                    self.persist(&lists);
                    (true, list_index == 0)
                }
                None => (false, false),
            }
        };
        if on_active {
            self.push.notify(SyncRegion::Shopping);
        }
        found
    }

    /// Checks or unchecks an item on any list.
    pub fn set_checked(&self, id: Uuid, checked: bool) -> bool {
        let (found, on_active) = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            let mut found = false;
            let mut on_active = false;
            for (index, list) in lists.iter_mut().enumerate() {
                if let Some(item) = list.items.iter_mut().find(|item| item.id == id) {
                    item.checked = checked;
                    found = true;
                    on_active = index == 0;
                    break;
                }
            }
            if found {
                self.persist(&lists);
            }
            (found, on_active)
        };
        if on_active {
            self.push.notify(SyncRegion::Shopping);
        }
        found
    }

    pub fn remove_item(&self, id: Uuid) -> bool {
        let (removed, on_active) = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            let mut removed = false;
            let mut on_active = false;
            for (index, list) in lists.iter_mut().enumerate() {
                let before = list.items.len();
                list.items.retain(|item| item.id != id);
                if list.items.len() != before {
                    removed = true;
                    on_active |= index == 0;
                }
            }
            if removed {
                self.persist(&lists);
            }
            (removed, on_active)
        };
        if on_active {
            self.push.notify(SyncRegion::Shopping);
        }
        removed
    }

    #[must_use]
    pub fn checked_items(&self) -> Vec<ShoppingItem> {
        self.lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .map(|list| {
                list.items
                    .iter()
                    .filter(|item| item.checked)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drains the checked rows out of the active list and returns them.
    pub fn take_checked(&self) -> Vec<ShoppingItem> {
        let taken = {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            let Some(list) = lists.first_mut() else {
                return Vec::new();
            };
            let (checked, rest): (Vec<ShoppingItem>, Vec<ShoppingItem>) =
                list.items.drain(..).partition(|item| item.checked);
            list.items = rest;
            if !checked.is_empty() {
                self.persist(&lists);
            }
            checked
        };
        if !taken.is_empty() {
            self.push.notify(SyncRegion::Shopping);
        }
        taken
    }

    /// Applies a remote snapshot's item slice onto the active list,
    /// creating one if none exists. Archive lists are untouched and
    /// nothing is pushed back.
    pub fn replace_active_from_remote(&self, mut incoming: Vec<ShoppingItem>) {
        sort_items(&mut incoming);
        let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
        match lists.first_mut() {
            Some(list) => list.items = incoming,
            None => {
                let mut list = ShoppingList::new(DEFAULT_LIST_NAME);
                list.items = incoming;
                lists.push(list);
            }
        }
        self.persist(&lists);
    }

    fn persist(&self, lists: &[ShoppingList]) {
        if let Err(error) = save_slot(self.local.as_ref(), SLOT, &lists) {
            tracing::warn!(%error, slot = SLOT, "failed to persist shopping state");
        }
    }
}

fn sort_items(items: &mut [ShoppingItem]) {
    items.sort_by_cached_key(|item| (item.category, normalize_name(&item.name)));
}

#[cfg(test)]
mod tests {
    use crate::local::MemoryLocalStore;

    use super::*;

    fn store() -> (
        ShoppingStore,
        tokio::sync::mpsc::UnboundedReceiver<SyncRegion>,
    ) {
        let (push, rx) = PushHandle::channel();
        (
            ShoppingStore::open(Arc::new(MemoryLocalStore::new()), push),
            rx,
        )
    }

    #[test]
    fn adding_creates_a_default_active_list() {
        let (shopping, _rx) = store();
        shopping.add_item("milk", 1.0, "L", Category::Dairy);

        let active = shopping.active_list().expect("active list");
        assert_eq!(active.name, "Shopping");
        assert_eq!(active.items.len(), 1);
    }

    #[test]
    fn same_name_and_unit_aggregates_quantity() {
        let (shopping, _rx) = store();
        shopping.add_item("milk", 1.0, "L", Category::Dairy);
        shopping.add_item("bleach", 1.0, "pc", Category::Other);
        let row = shopping.add_item("Milk", 2.0, "L", Category::Dairy);

        assert_eq!(row.name, "milk");
        assert_eq!(row.unit, "L");
        assert_eq!(row.quantity, 3.0);

        let active = shopping.active_list().expect("active list");
        assert_eq!(active.items.len(), 2);
        // Dairy sorts ahead of the other-category row.
        assert_eq!(active.items[0].name, "milk");
        assert_eq!(active.items[1].name, "bleach");
    }

    #[test]
    fn different_unit_makes_a_new_row() {
        let (shopping, _rx) = store();
        shopping.add_item("milk", 1.0, "L", Category::Dairy);
        shopping.add_item("milk", 6.0, "pc", Category::Dairy);

        let active = shopping.active_list().expect("active list");
        assert_eq!(active.items.len(), 2);
    }

    #[test]
    fn aggregating_into_a_checked_row_unchecks_it() {
        let (shopping, _rx) = store();
        let row = shopping.add_item("milk", 1.0, "L", Category::Dairy);
        assert!(shopping.set_checked(row.id, true));

        let merged = shopping.add_item("milk", 1.0, "L", Category::Dairy);
        assert!(!merged.checked);
        assert_eq!(merged.quantity, 2.0);
    }

    #[test]
    fn updating_a_row_replaces_it_in_place() {
        let (shopping, mut rx) = store();
        let row = shopping.add_item("milk", 1.0, "L", Category::Dairy);
        while rx.try_recv().is_ok() {}

        let mut edited = row.clone();
        edited.quantity = 2.0;
        edited.category = Category::Beverages;
        assert!(shopping.update_item(edited));
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Shopping));

        let active = shopping.active_list().expect("active list");
        assert_eq!(active.items[0].quantity, 2.0);
        assert_eq!(active.items[0].category, Category::Beverages);

        let mut ghost = row;
        ghost.id = Uuid::new_v4();
        assert!(!shopping.update_item(ghost));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn archive_list_edits_do_not_push() {
        let (shopping, mut rx) = store();
        shopping.create_list("Weekly");
        let cake = shopping.add_item("cake", 1.0, "pc", Category::Bakery);
        let party = shopping.create_list("Party");
        assert!(shopping.set_active(party.id));
        while rx.try_recv().is_ok() {}

        // The cake row now lives on an archive; edits to it stay local.
        assert!(shopping.set_checked(cake.id, true));
        assert!(shopping.remove_item(cake.id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn items_sort_by_category_then_name() {
        let (shopping, _rx) = store();
        shopping.add_item("bleach", 1.0, "pc", Category::Other);
        shopping.add_item("apples", 4.0, "pc", Category::Produce);
        shopping.add_item("milk", 1.0, "L", Category::Dairy);

        let names: Vec<String> = shopping
            .active_list()
            .expect("active list")
            .items
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["apples", "milk", "bleach"]);
    }

    #[test]
    fn unknown_category_sorts_last() {
        let (shopping, _rx) = store();
        let exotic: Category = serde_json::from_str("\"charcuterie\"").expect("decode");
        shopping.add_item("mystery", 1.0, "pc", exotic);
        shopping.add_item("bread", 1.0, "pc", Category::Bakery);

        let names: Vec<String> = shopping
            .active_list()
            .expect("active list")
            .items
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["bread", "mystery"]);
    }

    #[test]
    fn checked_flow_takes_only_checked_rows() {
        let (shopping, mut rx) = store();
        let milk = shopping.add_item("milk", 1.0, "L", Category::Dairy);
        let bread = shopping.add_item("bread", 1.0, "pc", Category::Bakery);
        shopping.set_checked(milk.id, true);
        while rx.try_recv().is_ok() {}

        let taken = shopping.take_checked();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].id, milk.id);
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Shopping));

        let remaining = shopping.active_list().expect("active list").items;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, bread.id);
    }

    #[test]
    fn take_checked_with_none_checked_does_not_push() {
        let (shopping, mut rx) = store();
        shopping.add_item("milk", 1.0, "L", Category::Dairy);
        while rx.try_recv().is_ok() {}

        assert!(shopping.take_checked().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn second_list_is_an_archive_until_activated() {
        let (shopping, mut rx) = store();
        let first = shopping.create_list("Weekly");
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Shopping));

        let second = shopping.create_list("Party");
        assert!(rx.try_recv().is_err(), "archive creation should not push");

        assert_eq!(shopping.active_list().expect("active").id, first.id);
        assert!(shopping.set_active(second.id));
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Shopping));
        assert_eq!(shopping.active_list().expect("active").id, second.id);
    }

    #[test]
    fn removing_the_active_list_promotes_the_next() {
        let (shopping, mut rx) = store();
        let first = shopping.create_list("Weekly");
        let second = shopping.create_list("Party");
        while rx.try_recv().is_ok() {}

        assert!(shopping.remove_list(first.id));
        assert_eq!(rx.try_recv(), Ok(SyncRegion::Shopping));
        assert_eq!(shopping.active_list().expect("active").id, second.id);

        assert!(!shopping.remove_list(first.id));
    }

    #[test]
    fn replace_active_from_remote_spares_archives_and_does_not_push() {
        let (shopping, mut rx) = store();
        shopping.create_list("Weekly");
        let archive = shopping.create_list("Party");
        shopping.add_item("milk", 1.0, "L", Category::Dairy);
        while rx.try_recv().is_ok() {}

        shopping.replace_active_from_remote(vec![ShoppingItem::new(
            "coffee",
            1.0,
            "bag",
            Category::Beverages,
        )]);

        assert!(rx.try_recv().is_err());
        let lists = shopping.lists();
        assert_eq!(lists[0].items.len(), 1);
        assert_eq!(lists[0].items[0].name, "coffee");
        assert_eq!(lists[1].id, archive.id);
        assert!(lists[1].items.is_empty());
    }

    #[test]
    fn replace_active_from_remote_creates_a_list_when_none_exists() {
        let (shopping, _rx) = store();
        shopping.replace_active_from_remote(vec![ShoppingItem::new(
            "tea",
            1.0,
            "box",
            Category::Beverages,
        )]);

        let active = shopping.active_list().expect("active list");
        assert_eq!(active.name, "Shopping");
        assert_eq!(active.items.len(), 1);
    }

    #[test]
    fn state_survives_reopen_from_same_slots() {
        let local: Arc<MemoryLocalStore> = Arc::new(MemoryLocalStore::new());

        let shopping = ShoppingStore::open(local.clone(), PushHandle::disconnected());
        shopping.add_item("milk", 1.0, "L", Category::Dairy);
        drop(shopping);

        let reopened = ShoppingStore::open(local, PushHandle::disconnected());
        assert_eq!(reopened.active_list().expect("active").items.len(), 1);
    }
}
