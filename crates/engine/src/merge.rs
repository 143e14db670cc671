use larder_sync_core::Snapshot;
use larder_sync_stores::StoreSet;

/// Applies one remote snapshot to the local stores.
///
/// Pantry, meal plans and favorites take the remote state wholesale; the
/// newest writer wins region by region, so two devices editing the same
/// region offline keep only whichever push lands last. The shopping
/// snapshot replaces only the active list, since archived lists never
/// leave the device.
/// Custom recipes merge additively by id, so a recipe authored here
/// survives a delivery that predates it. Applying the same snapshot
/// twice leaves the stores unchanged.
///
/// Stores take remote state through their non-notifying entry points, so
/// a merge never feeds back into the push pipeline.
pub fn apply_snapshot(stores: &StoreSet, snapshot: &Snapshot) {
    stores.pantry.replace_from_remote(snapshot.pantry.clone());
    stores
        .shopping
        .replace_active_from_remote(snapshot.shopping_items.clone());
    stores
        .meal_plans
        .replace_from_remote(snapshot.meal_plans.clone());
    stores.recipes.merge_remote(snapshot.custom_recipes.clone());
    stores
        .recipes
        .replace_favorites_from_remote(snapshot.favorites.clone());
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use larder_sync_core::{Category, Ingredient, Recipe, ShoppingItem};
    use larder_sync_stores::{MemoryLocalStore, PushHandle, StoreSet};

    use super::*;

    fn stores() -> StoreSet {
        StoreSet::open(Arc::new(MemoryLocalStore::new()), PushHandle::disconnected())
    }

    fn remote_snapshot() -> Snapshot {
        Snapshot {
            pantry: vec![Ingredient::new("rice", 2.0, "kg", Category::Pantry)],
            shopping_items: vec![ShoppingItem::new("milk", 1.0, "L", Category::Dairy)],
            favorites: vec!["chili".to_owned()],
            custom_recipes: vec![Recipe::new("chili", "Chili")],
            last_synced_at: 1_700_000_000_000,
            ..Snapshot::default()
        }
    }

    #[test]
    fn replaces_pantry_and_favorites_wholesale() {
        let stores = stores();
        stores.pantry.add_item("flour", 1.0, "kg", Category::Pantry);
        stores.recipes.toggle_favorite("soup");

        apply_snapshot(&stores, &remote_snapshot());

        let pantry = stores.pantry.items();
        assert_eq!(pantry.len(), 1);
        assert_eq!(pantry[0].name, "rice");
        assert_eq!(stores.recipes.favorites(), vec!["chili".to_owned()]);
    }

    #[test]
    fn local_only_recipe_survives_a_merge() {
        let stores = stores();
        stores.recipes.save_recipe(Recipe::new("soup", "Soup"));

        apply_snapshot(&stores, &remote_snapshot());

        assert!(stores.recipes.recipe("soup").is_some());
        assert!(stores.recipes.recipe("chili").is_some());
    }

    #[test]
    fn archived_shopping_lists_are_untouched() {
        let stores = stores();
        stores.shopping.create_list("Costco run");
        stores
            .shopping
            .add_item("bulk beans", 4.0, "kg", Category::Pantry);
        let archived = stores.shopping.create_list("Weekly");
        stores.shopping.set_active(archived.id);

        apply_snapshot(&stores, &remote_snapshot());

        let lists = stores.shopping.lists();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].items.len(), 1);
        assert_eq!(lists[0].items[0].name, "milk");
        let costco = lists
            .iter()
            .find(|list| list.name == "Costco run")
            .expect("archived list kept");
        assert_eq!(costco.items[0].name, "bulk beans");
    }

    #[test]
    fn applying_the_same_snapshot_twice_is_idempotent() {
        let stores = stores();
        let snapshot = remote_snapshot();

        apply_snapshot(&stores, &snapshot);
        let pantry = stores.pantry.items();
        let lists = stores.shopping.lists();
        let recipes = stores.recipes.recipes();

        apply_snapshot(&stores, &snapshot);
        assert_eq!(stores.pantry.items(), pantry);
        assert_eq!(stores.shopping.lists(), lists);
        assert_eq!(stores.recipes.recipes(), recipes);
    }

    #[test]
    fn merge_never_notifies_the_push_hook() {
        let (push, mut mutations) = PushHandle::channel();
        let stores = StoreSet::open(Arc::new(MemoryLocalStore::new()), push);

        apply_snapshot(&stores, &remote_snapshot());

        assert!(mutations.try_recv().is_err());
    }
}
