#![forbid(unsafe_code)]

//! Shared domain types for the Larder sync engine: grocery entities,
//! partition addressing, and the synchronized snapshot aggregate.

mod category;
mod domain;
mod normalize;
mod partition;
mod snapshot;

pub use category::Category;
pub use domain::{
    Ingredient, MealPlanEntry, MealSlot, Recipe, RecipeIngredient, ShoppingItem, ShoppingList,
};
pub use normalize::{normalize_name, normalize_unit};
pub use partition::{larder_namespace, HouseholdId, PartitionKey, PartitionParseError};
pub use snapshot::{now_millis, Snapshot, SnapshotPatch, SyncRegion};
