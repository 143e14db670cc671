#![forbid(unsafe_code)]

//! Domain stores for one device: pantry, shopping lists, meal plans,
//! and recipes. Each store owns one slice of local truth, persists it to
//! a durable slot after every mutation, and fires a push hook so the
//! sync engine can mirror it to the partition document.

mod hook;
mod local;
mod meal_plan;
mod pantry;
mod recipes;
mod set;
mod shopping;

pub use hook::PushHandle;
pub use local::{load_slot, save_slot, FileLocalStore, LocalStore, LocalStoreError, MemoryLocalStore};
pub use meal_plan::MealPlanStore;
pub use pantry::PantryStore;
pub use recipes::RecipeStore;
pub use set::StoreSet;
pub use shopping::ShoppingStore;
