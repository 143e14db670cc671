use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::category::Category;

/// A pantry row: something the household currently has on hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: Category,
}

impl Ingredient {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            quantity,
            unit: unit.into(),
            category,
        }
    }
}

/// A shopping row: something the household still needs to buy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: Category,
    #[serde(default)]
    pub checked: bool,
}

impl ShoppingItem {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            quantity,
            unit: unit.into(),
            category,
            checked: false,
        }
    }
}

/// A named shopping list. The first list in a store is the active one;
/// the rest are archives kept for history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ShoppingItem>,
}

impl ShoppingList {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            items: Vec::new(),
        }
    }
}

/// Meal slot within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl Display for MealSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned meal on a calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanEntry {
    pub id: Uuid,
    pub date: Date,
    pub slot: MealSlot,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<String>,
}

impl MealPlanEntry {
    #[must_use]
    pub fn new(date: Date, slot: MealSlot, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            slot,
            title: title.into(),
            recipe_id: None,
        }
    }

    #[must_use]
    pub fn with_recipe(mut self, recipe_id: impl Into<String>) -> Self {
        self.recipe_id = Some(recipe_id.into());
        self
    }
}

/// One ingredient line inside a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

impl RecipeIngredient {
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

/// A recipe. The id is caller-assigned (often a slug or an upstream
/// catalog id) so two devices saving the same recipe converge on one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Recipe {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            servings: None,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn ingredient_serializes_with_camel_case_keys() {
        let ingredient = Ingredient::new("Rolled Oats", 1.0, "kg", Category::Pantry);
        let value = serde_json::to_value(&ingredient).expect("encode");
        assert_eq!(value["name"], "Rolled Oats");
        assert_eq!(value["category"], "pantry");
        assert!(value.get("quantity").is_some());
    }

    #[test]
    fn shopping_item_checked_defaults_to_false() {
        let raw = r#"{
            "id": "2c6f2f6e-0c4f-4b0e-9f34-0d3a5f6f7b8c",
            "name": "milk",
            "quantity": 1.0,
            "unit": "l",
            "category": "dairy"
        }"#;
        let item: ShoppingItem = serde_json::from_str(raw).expect("decode");
        assert!(!item.checked);
    }

    #[test]
    fn meal_plan_entry_skips_absent_recipe_id() {
        let entry = MealPlanEntry::new(date!(2025 - 03 - 10), MealSlot::Dinner, "Chili");
        let value = serde_json::to_value(&entry).expect("encode");
        assert!(value.get("recipeId").is_none());

        let linked = entry.with_recipe("weeknight-chili");
        let value = serde_json::to_value(&linked).expect("encode");
        assert_eq!(value["recipeId"], "weeknight-chili");
    }

    #[test]
    fn recipe_decodes_with_missing_collections() {
        let raw = r#"{"id": "pesto", "title": "Pesto"}"#;
        let recipe: Recipe = serde_json::from_str(raw).expect("decode");
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.instructions.is_empty());
        assert!(recipe.tags.is_empty());
        assert_eq!(recipe.servings, None);
    }

    #[test]
    fn meal_slot_round_trips_lowercase() {
        let encoded = serde_json::to_string(&MealSlot::Breakfast).expect("encode");
        assert_eq!(encoded, "\"breakfast\"");
        let decoded: MealSlot = serde_json::from_str("\"snack\"").expect("decode");
        assert_eq!(decoded, MealSlot::Snack);
    }
}
