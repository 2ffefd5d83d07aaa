//! # Site Core
//!
//! The engines that bring pages to life:
//!
//! - **buddy**: autonomous on-page entities with a render/remove lifecycle
//! - **behavior**: movement policies computing where a buddy goes next
//! - **registry**: global and per-page buddy collections driven by page signals
//! - **objectives**: goals re-evaluated on every state change
//!
//! Everything here is single-threaded and driven by the host's event loop,
//! represented by [`timers::Scheduler`] and the signals from `site_state`.
//! The page itself is reached through the [`stage::Stage`] and
//! [`objectives::ObjectiveSurface`] traits.

pub mod behavior;
pub mod buddy;
pub mod config;
pub mod error;
pub mod geometry;
pub mod headless;
pub mod location;
pub mod objectives;
pub mod registry;
pub mod stage;
pub mod timers;

pub use behavior::*;
pub use buddy::*;
pub use config::*;
pub use error::*;
pub use geometry::*;
pub use location::*;
pub use objectives::*;
pub use registry::*;
pub use stage::*;
pub use timers::*;
