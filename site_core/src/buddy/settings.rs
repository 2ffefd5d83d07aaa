//! Buddy construction settings and event hooks.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::behavior::BehaviorSettings;
use crate::location::PathSpec;

/// Default edge length of the figure image.
pub const DEFAULT_FIGURE_SIZE: &str = "75px";

/// How long chatter stays up unless told otherwise.
pub const DEFAULT_CHATTER_MS: u64 = 6000;

/// What the buddy's element looks like.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSettings {
    /// Unique across the site for global buddies.
    pub id: String,

    /// Examine entity shown when the buddy is inspected.
    #[serde(default)]
    pub entity: Option<String>,

    /// CSS classes added on creation.
    #[serde(default)]
    pub classes: Option<String>,

    /// Image for the default figure.
    #[serde(default)]
    pub img: Option<String>,

    /// Figure edge length; [`DEFAULT_FIGURE_SIZE`] when unset.
    #[serde(default)]
    pub size: Option<String>,

    /// Extra figure contents.
    #[serde(default)]
    pub figure: Option<String>,

    /// Dialogue actor used in conversations.
    #[serde(default)]
    pub actor: Option<String>,
}

impl ElementSettings {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_classes(mut self, classes: impl Into<String>) -> Self {
        self.classes = Some(classes.into());
        self
    }

    pub fn with_img(mut self, img: impl Into<String>) -> Self {
        self.img = Some(img.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn size_or_default(&self) -> &str {
        self.size.as_deref().unwrap_or(DEFAULT_FIGURE_SIZE)
    }

    /// Name chatter is logged under.
    pub fn speaker(&self) -> &str {
        self.actor.as_deref().unwrap_or(&self.id)
    }
}

/// Pages a buddy may appear on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSettings {
    pub path: PathSpec,

    /// Never pick a path the player has not explored.
    #[serde(default)]
    pub explored_only: bool,
}

impl LocationSettings {
    pub fn new(path: impl Into<PathSpec>) -> Self {
        Self {
            path: path.into(),
            explored_only: false,
        }
    }

    pub fn explored_only(mut self) -> Self {
        self.explored_only = true;
        self
    }
}

/// Everything needed to build a buddy except its hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuddySettings {
    pub element: ElementSettings,
    pub behavior: BehaviorSettings,

    /// Absent for buddies that appear on whatever page defines them.
    #[serde(default)]
    pub location: Option<LocationSettings>,

    /// Checked on every page load instead of belonging to one page.
    #[serde(default)]
    pub global: bool,
}

impl BuddySettings {
    pub fn new(element: ElementSettings, behavior: BehaviorSettings) -> Self {
        Self {
            element,
            behavior,
            location: None,
            global: false,
        }
    }

    pub fn with_location(mut self, location: LocationSettings) -> Self {
        self.location = Some(location);
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }
}

pub(crate) type Hook = Rc<dyn Fn()>;

/// Optional lifecycle hooks. All are invoked synchronously.
#[derive(Clone, Default)]
pub struct BuddyEvents {
    pub(crate) on_render: Option<Hook>,
    pub(crate) screen_enter: Option<Hook>,
    pub(crate) page_enter: Option<Hook>,
    pub(crate) mouse_enter: Option<Hook>,
    pub(crate) leaving: Option<Hook>,
}

impl BuddyEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// After the element is created.
    pub fn on_render(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_render = Some(Rc::new(hook));
        self
    }

    /// When the element scrolls into view.
    pub fn screen_enter(mut self, hook: impl Fn() + 'static) -> Self {
        self.screen_enter = Some(Rc::new(hook));
        self
    }

    /// Once per page load.
    pub fn page_enter(mut self, hook: impl Fn() + 'static) -> Self {
        self.page_enter = Some(Rc::new(hook));
        self
    }

    /// When the cursor enters the page.
    pub fn mouse_enter(mut self, hook: impl Fn() + 'static) -> Self {
        self.mouse_enter = Some(Rc::new(hook));
        self
    }

    /// Before teardown when leaving the page.
    pub fn leaving(mut self, hook: impl Fn() + 'static) -> Self {
        self.leaving = Some(Rc::new(hook));
        self
    }
}

impl std::fmt::Debug for BuddyEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuddyEvents")
            .field("on_render", &self.on_render.is_some())
            .field("screen_enter", &self.screen_enter.is_some())
            .field("page_enter", &self.page_enter.is_some())
            .field("mouse_enter", &self.mouse_enter.is_some())
            .field("leaving", &self.leaving.is_some())
            .finish()
    }
}

/// Options for [`crate::Buddy::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveOptions {
    /// Detach the element from the page.
    pub remove_el: bool,
    /// Fire the `leaving` hook first.
    pub leaving: bool,
}

impl RemoveOptions {
    pub fn new(remove_el: bool, leaving: bool) -> Self {
        Self {
            remove_el,
            leaving,
        }
    }
}

/// Options for [`crate::Buddy::chatter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatterOptions {
    pub text: String,
    pub duration_ms: u64,
    /// Record in the dialogue log.
    pub log: bool,
    /// Read aloud.
    pub readout: bool,
}

impl ChatterOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration_ms: DEFAULT_CHATTER_MS,
            log: true,
            readout: false,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn with_readout(mut self, readout: bool) -> Self {
        self.readout = readout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorKind;

    #[test]
    fn test_element_defaults() {
        let element = ElementSettings::new("funfriend");
        assert_eq!(element.size_or_default(), "75px");
        assert_eq!(element.speaker(), "funfriend");

        let element = element.with_actor("funfriend_actor");
        assert_eq!(element.speaker(), "funfriend_actor");
    }

    #[test]
    fn test_chatter_defaults() {
        let chatter = ChatterOptions::new("hello");
        assert_eq!(chatter.duration_ms, 6000);
        assert!(chatter.log);
        assert!(!chatter.readout);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: BuddySettings = toml::from_str(
            r##"
            global = true

            [element]
            id = "funfriend"
            classes = "friend small"

            [behavior]
            type = "follow"
            rate = 1000
            threshold = 50.0
            mui_pause = true

            [location]
            path = ["/local/ocean/", "/local/depths/"]
            explored_only = true
            "##,
        )
        .unwrap();

        assert!(settings.global);
        assert_eq!(settings.behavior.kind, BehaviorKind::Follow);
        assert!(settings.behavior.mui_pause);
        assert_eq!(settings.location.unwrap().path.as_slice().len(), 2);
    }

    #[test]
    fn test_unknown_behavior_rejected_by_toml() {
        let result: Result<BuddySettings, _> = toml::from_str(
            r#"
            [element]
            id = "x"

            [behavior]
            type = "teleport"
            rate = 100
            "#,
        );
        assert!(result.is_err());
    }
}
