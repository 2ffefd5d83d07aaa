//! The page as the engines see it.
//!
//! Element construction, styling and animation belong to the host. Buddies
//! only ask the stage to mount, move and annotate elements, and to answer
//! a few questions about the page.

use serde::{Deserialize, Serialize};

use crate::buddy::ElementSettings;
use crate::geometry::{Position, Rect};

/// A buddy's root element, owned by the buddy while it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

/// Non-owning reference to some other element on the page, by selector.
///
/// The element may come and go with the page; it is looked up on every use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn selector(&self) -> &str {
        &self.0
    }
}

/// Host services used by buddies.
pub trait Stage {
    /// Build a buddy's root element and attach it to the page.
    fn mount(&self, element: &ElementSettings) -> ElementHandle;

    /// Remove an element from the page.
    fn detach(&self, element: ElementHandle);

    /// Animate an element to `to` over `transition_ms`.
    fn move_to(&self, element: ElementHandle, to: Position, transition_ms: u64);

    /// Show transient text next to an element.
    fn show_chatter(&self, element: ElementHandle, text: &str);

    /// Clear an element's transient text.
    fn clear_chatter(&self, element: ElementHandle);

    /// Start reporting viewport intersection for an element.
    fn observe(&self, element: ElementHandle);

    /// Stop reporting viewport intersection for an element.
    fn unobserve(&self, element: ElementHandle);

    /// Last known cursor position, if the cursor is over the page.
    fn cursor(&self) -> Option<Position>;

    /// The visible part of the page.
    fn viewport(&self) -> Rect;

    /// The full scrollable page.
    fn page_bounds(&self) -> Rect;

    /// Current bounds of a foreign element, `None` if it is not on the page.
    fn element_rect(&self, target: &ElementRef) -> Option<Rect>;

    /// Whether a modal overlay is open over the page.
    fn overlay_open(&self) -> bool;

    /// Record chatter in the dialogue log.
    fn log_chatter(&self, _speaker: &str, _text: &str) {}

    /// Read text aloud.
    fn readout(&self, _text: &str) {}
}
