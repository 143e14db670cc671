use std::sync::{Arc, PoisonError, RwLock};

use larder_sync_core::{normalize_name, Recipe, SyncRegion};
use serde::{Deserialize, Serialize};

use crate::hook::PushHandle;
use crate::local::{load_slot, save_slot, LocalStore};

const SLOT: &str = "recipes";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecipeState {
    custom_recipes: Vec<Recipe>,
    favorites: Vec<String>,
}

/// Saved recipes plus the favorite markers. Recipes merge additively
/// across devices: a remote snapshot can add or overwrite recipes by id
/// but never makes a locally saved one disappear.
pub struct RecipeStore {
    local: Arc<dyn LocalStore>,
    push: PushHandle,
    state: RwLock<RecipeState>,
}

impl RecipeStore {
    pub fn open(local: Arc<dyn LocalStore>, push: PushHandle) -> Self {
        let mut state: RecipeState = match load_slot(local.as_ref(), SLOT) {
            Ok(state) => state.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(%error, slot = SLOT, "discarding unreadable recipe state");
                RecipeState::default()
            }
        };
        sort_recipes(&mut state.custom_recipes);
        Self {
            local,
            push,
            state: RwLock::new(state),
        }
    }

    #[must_use]
    pub fn recipes(&self) -> Vec<Recipe> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .custom_recipes
            .clone()
    }

    #[must_use]
    pub fn recipe(&self, id: &str) -> Option<Recipe> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .custom_recipes
            .iter()
            .find(|recipe| recipe.id == id)
            .cloned()
    }

    /// Saves a recipe, overwriting any existing one with the same id.
    pub fn save_recipe(&self, recipe: Recipe) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match state
                .custom_recipes
                .iter_mut()
                .find(|existing| existing.id == recipe.id)
            {
                Some(slot) => *slot = recipe,
                None => state.custom_recipes.push(recipe),
            }
            sort_recipes(&mut state.custom_recipes);
            self.persist(&state);
        }
        self.push.notify(SyncRegion::Recipes);
    }

    /// Removes a recipe and its favorite marker, if any.
    pub fn remove_recipe(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = state.custom_recipes.len();
            state.custom_recipes.retain(|recipe| recipe.id != id);
            let removed = state.custom_recipes.len() != before;
            if removed {
                state.favorites.retain(|favorite| favorite != id);
                self.persist(&state);
            }
            removed
        };
        if removed {
            self.push.notify(SyncRegion::Recipes);
        }
        removed
    }

    #[must_use]
    pub fn favorites(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .favorites
            .clone()
    }

    #[must_use]
    pub fn is_favorite(&self, id: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .favorites
            .iter()
            .any(|favorite| favorite == id)
    }

    /// Flips the favorite marker for an id and returns the new state.
    pub fn toggle_favorite(&self, id: &str) -> bool {
        let now_favorite = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let was = state.favorites.iter().any(|favorite| favorite == id);
            if was {
                state.favorites.retain(|favorite| favorite != id);
            } else {
                state.favorites.push(id.to_owned());
            }
            self.persist(&state);
            !was
        };
        self.push.notify(SyncRegion::Recipes);
        now_favorite
    }

    /// Applies a remote snapshot's recipe slice. Additive and keyed by
    /// id: remote rows overwrite same-id local rows, local-only rows
    /// survive. Nothing is pushed back.
    pub fn merge_remote(&self, incoming: Vec<Recipe>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for remote in incoming {
            match state
                .custom_recipes
                .iter_mut()
                .find(|existing| existing.id == remote.id)
            {
                Some(slot) => *slot = remote,
                None => state.custom_recipes.push(remote),
            }
        }
        sort_recipes(&mut state.custom_recipes);
        self.persist(&state);
    }

    /// Applies a remote snapshot's favorites: wholesale replacement,
    /// never pushed back.
    pub fn replace_favorites_from_remote(&self, favorites: Vec<String>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.favorites = favorites;
        self.persist(&state);
    }

    fn persist(&self, state: &RecipeState) {
        if let Err(error) = save_slot(self.local.as_ref(), SLOT, state) {
            tracing::warn!(%error, slot = SLOT, "failed to persist recipe state");
        }
    }
}

fn sort_recipes(recipes: &mut [Recipe]) {
    recipes.sort_by_cached_key(|recipe| normalize_name(&recipe.title));
}
