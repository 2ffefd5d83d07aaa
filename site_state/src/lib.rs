//! # Site State
//!
//! The external state the buddy and objective engines react to: the player's
//! save data, which pages have been explored, and the signals fired whenever
//! that state changes or the player moves between pages.
//!
//! This crate does not know about buddies or objectives. It is the single
//! source of truth they read from.

pub mod save;
pub mod signals;
pub mod store;

pub use save::*;
pub use signals::*;
pub use store::*;
