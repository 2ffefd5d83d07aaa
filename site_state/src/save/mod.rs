//! Save data - page flags, explored paths and the current page.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised while importing or exporting save data.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("malformed save data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only access to game state.
///
/// Conditions and selectors receive this instead of reaching for a global,
/// so tests can hand them any state they like.
pub trait StateLookup {
    /// Raw value of a page flag.
    fn flag(&self, key: &str) -> Option<&Value>;

    /// Whether the player has visited `path`.
    fn has_explored(&self, path: &str) -> bool;

    /// Path of the page currently displayed, if any.
    fn current_path(&self) -> Option<&str>;

    /// Check a completion token: true when the flag exists and is truthy.
    fn check(&self, token: &str) -> bool {
        self.flag(token).is_some_and(is_truthy)
    }
}

/// Truthiness of a flag value.
///
/// `null`, `false`, `0`, `""`, `[]` and `{}` are falsy, everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// The player's save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    /// Zone the save was made in.
    #[serde(default)]
    pub save_zone: Option<String>,

    /// Free-form flags set by pages and dialogue.
    #[serde(default)]
    pub page_flags: HashMap<String, Value>,

    /// Every path the player has visited.
    #[serde(default)]
    pub explored: BTreeSet<String>,

    /// Not persisted.
    #[serde(skip)]
    pub current_path: Option<String>,
}

impl SaveState {
    /// Create an empty save.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a page flag.
    pub fn set_flag(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.page_flags.insert(key.into(), value.into());
    }

    /// Remove a page flag, returning its previous value.
    pub fn clear_flag(&mut self, key: &str) -> Option<Value> {
        self.page_flags.remove(key)
    }

    /// Record a path as visited.
    pub fn mark_explored(&mut self, path: impl Into<String>) {
        self.explored.insert(path.into());
    }

    /// Parse a save from JSON.
    pub fn from_json(json: &str) -> Result<Self, SaveError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the save to JSON.
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl StateLookup for SaveState {
    fn flag(&self, key: &str) -> Option<&Value> {
        self.page_flags.get(key)
    }

    fn has_explored(&self, path: &str) -> bool {
        self.explored.contains(path)
    }

    fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }
}
