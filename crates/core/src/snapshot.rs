use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{Ingredient, MealPlanEntry, Recipe, ShoppingItem};

/// One slice of the synchronized aggregate. Each local mutation is tagged
/// with the region it touched so pushes carry only that region's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncRegion {
    Pantry,
    Shopping,
    MealPlans,
    Recipes,
}

impl SyncRegion {
    pub const ALL: [Self; 4] = [Self::Pantry, Self::Shopping, Self::MealPlans, Self::Recipes];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pantry => "pantry",
            Self::Shopping => "shopping",
            Self::MealPlans => "meal_plans",
            Self::Recipes => "recipes",
        }
    }
}

impl Display for SyncRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full synchronized aggregate for one partition, as the remote
/// document stores it. `last_synced_at` is epoch milliseconds and must
/// never move backwards for a given partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub pantry: Vec<Ingredient>,
    pub shopping_items: Vec<ShoppingItem>,
    pub meal_plans: Vec<MealPlanEntry>,
    pub favorites: Vec<String>,
    pub custom_recipes: Vec<Recipe>,
    pub last_synced_at: i64,
}

/// A partial write against a remote document. Fields left as `None` are
/// not touched remotely, which is what lets two stores push concurrently
/// without erasing each other's slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pantry: Option<Vec<Ingredient>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopping_items: Option<Vec<ShoppingItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_plans: Option<Vec<MealPlanEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorites: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_recipes: Option<Vec<Recipe>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<i64>,
}

impl SnapshotPatch {
    /// A patch carrying every field, used for the first push to a
    /// partition that has never been written.
    #[must_use]
    pub fn full(snapshot: Snapshot) -> Self {
        Self {
            pantry: Some(snapshot.pantry),
            shopping_items: Some(snapshot.shopping_items),
            meal_plans: Some(snapshot.meal_plans),
            favorites: Some(snapshot.favorites),
            custom_recipes: Some(snapshot.custom_recipes),
            last_synced_at: Some(snapshot.last_synced_at),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pantry.is_none()
            && self.shopping_items.is_none()
            && self.meal_plans.is_none()
            && self.favorites.is_none()
            && self.custom_recipes.is_none()
            && self.last_synced_at.is_none()
    }

    /// Applies this patch onto a document: present fields overwrite,
    /// absent fields leave the document untouched.
    pub fn apply_to(&self, snapshot: &mut Snapshot) {
        if let Some(pantry) = &self.pantry {
            snapshot.pantry = pantry.clone();
        }
        if let Some(items) = &self.shopping_items {
            snapshot.shopping_items = items.clone();
        }
        if let Some(plans) = &self.meal_plans {
            snapshot.meal_plans = plans.clone();
        }
        if let Some(favorites) = &self.favorites {
            snapshot.favorites = favorites.clone();
        }
        if let Some(recipes) = &self.custom_recipes {
            snapshot.custom_recipes = recipes.clone();
        }
        if let Some(at) = self.last_synced_at {
            snapshot.last_synced_at = at;
        }
    }
}

/// Current wall-clock time as epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
