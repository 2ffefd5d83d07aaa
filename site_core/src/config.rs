//! Buddy manifests - buddy definitions loaded from TOML.
//!
//! ```toml
//! [[buddy]]
//! global = true
//! element = { id = "guide", img = "/img/guide.png" }
//! behavior = { type = "wander", rate = 2000, limit = 120.0 }
//! location = { path = ["/hub/", "/local/ocean/"], explored_only = true }
//! ```
//!
//! Hooks are code and are attached when the buddies are spawned.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::behavior::validate_rate;
use crate::buddy::{Buddy, BuddyContext, BuddyEvents, BuddySettings};
use crate::error::{BuddyError, ConfigError};

/// A set of buddy definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuddyManifest {
    #[serde(default, rename = "buddy")]
    pub buddies: Vec<BuddySettings>,
}

impl BuddyManifest {
    /// Parse and validate a manifest.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let manifest: Self = toml::from_str(source)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read a manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let manifest = Self::from_toml_str(&source)?;
        info!(path = %path.display(), buddies = manifest.buddies.len(), "manifest_loaded");
        Ok(manifest)
    }

    /// Reject definitions that could never run: non-positive rates,
    /// anchored behaviors without an anchor, and repeated element ids.
    pub fn validate(&self) -> Result<(), BuddyError> {
        let mut seen = HashSet::new();
        for settings in &self.buddies {
            let id = &settings.element.id;
            validate_rate(settings.behavior.rate)?;
            if settings.behavior.kind.needs_anchor() && settings.behavior.element.is_none() {
                return Err(BuddyError::MissingAnchor { id: id.clone() });
            }
            if !seen.insert(id.as_str()) {
                return Err(BuddyError::AlreadyRegistered { id: id.clone() });
            }
        }
        Ok(())
    }

    /// Build every buddy without hooks.
    pub fn spawn(&self, ctx: &BuddyContext) -> Result<Vec<Buddy>, BuddyError> {
        self.spawn_with(ctx, |_| BuddyEvents::new())
    }

    /// Build every buddy, asking `events` for each one's hooks.
    pub fn spawn_with(
        &self,
        ctx: &BuddyContext,
        mut events: impl FnMut(&BuddySettings) -> BuddyEvents,
    ) -> Result<Vec<Buddy>, BuddyError> {
        self.buddies
            .iter()
            .map(|settings| Buddy::new(settings.clone(), events(settings), ctx.clone()))
            .collect()
    }
}
