use std::sync::Arc;

use larder_sync_core::{Ingredient, Snapshot, SnapshotPatch, SyncRegion};

use crate::hook::PushHandle;
use crate::local::LocalStore;
use crate::meal_plan::MealPlanStore;
use crate::pantry::PantryStore;
use crate::recipes::RecipeStore;
use crate::shopping::ShoppingStore;

/// The four domain stores of one device, opened over one local slot
/// store and one push hook. The sync engine reads local truth through
/// this set instead of the stores knowing about each other.
#[derive(Clone)]
pub struct StoreSet {
    pub pantry: Arc<PantryStore>,
    pub shopping: Arc<ShoppingStore>,
    pub meal_plans: Arc<MealPlanStore>,
    pub recipes: Arc<RecipeStore>,
}

impl StoreSet {
    pub fn open(local: Arc<dyn LocalStore>, push: PushHandle) -> Self {
        Self {
            pantry: Arc::new(PantryStore::open(local.clone(), push.clone())),
            shopping: Arc::new(ShoppingStore::open(local.clone(), push.clone())),
            meal_plans: Arc::new(MealPlanStore::open(local.clone(), push.clone())),
            recipes: Arc::new(RecipeStore::open(local, push)),
        }
    }

    /// The full local aggregate across all stores. `last_synced_at` is
    /// left at zero; the caller stamps it when the aggregate is pushed.
    #[must_use]
    pub fn aggregate(&self) -> Snapshot {
        Snapshot {
            pantry: self.pantry.items(),
            shopping_items: self
                .shopping
                .active_list()
                .map(|list| list.items)
                .unwrap_or_default(),
            meal_plans: self.meal_plans.entries(),
            favorites: self.recipes.favorites(),
            custom_recipes: self.recipes.recipes(),
            last_synced_at: 0,
        }
    }

    /// The partial write for one region: only that region's fields are
    /// present, so concurrent pushes from different stores cannot erase
    /// each other remotely.
    #[must_use]
    pub fn region_patch(&self, region: SyncRegion) -> SnapshotPatch {
        match region {
            SyncRegion::Pantry => SnapshotPatch {
                pantry: Some(self.pantry.items()),
                ..SnapshotPatch::default()
            },
            SyncRegion::Shopping => SnapshotPatch {
                shopping_items: Some(
                    self.shopping
                        .active_list()
                        .map(|list| list.items)
                        .unwrap_or_default(),
                ),
                ..SnapshotPatch::default()
            },
            SyncRegion::MealPlans => SnapshotPatch {
                meal_plans: Some(self.meal_plans.entries()),
                ..SnapshotPatch::default()
            },
            SyncRegion::Recipes => SnapshotPatch {
                favorites: Some(self.recipes.favorites()),
                custom_recipes: Some(self.recipes.recipes()),
                ..SnapshotPatch::default()
            },
        }
    }

    /// Moves every checked shopping row into the pantry: the rows leave
    /// the active shopping list and matching ingredients appear in the
    /// pantry. Each side fires its own push. Returns how many rows moved.
    pub fn move_checked_to_pantry(&self) -> usize {
        let checked = self.shopping.take_checked();
        let moved = checked.len();
        if moved == 0 {
            return 0;
        }

        let restock: Vec<Ingredient> = checked
            .into_iter()
            .map(|item| Ingredient::new(item.name, item.quantity, item.unit, item.category))
            .collect();
        self.pantry.restock(restock);
        moved
    }
}
