//! Behavior engine - the movement policy of a buddy.
//!
//! Every `rate` milliseconds the owning buddy asks the engine for its next
//! target. The engine itself holds no timers; it is a small state machine
//! over [`EngineState`] plus the target computation for each [`BehaviorKind`].

mod targets;

pub use targets::*;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BuddyError;
use crate::geometry::{Position, Rect};
use crate::stage::ElementRef;

/// Default pixel range used by `follow` and `element` when none is set.
pub const DEFAULT_THRESHOLD: f64 = 100.0;

/// Movement policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    /// Trail the cursor once it gets far enough away.
    Follow,
    /// Roam anywhere on the page, including off-screen.
    Wander,
    /// Roam inside another element.
    WanderElement,
    /// Trail another element.
    Element,
}

impl BehaviorKind {
    /// Whether the behavior needs a foreign element to gravitate to.
    pub fn needs_anchor(&self) -> bool {
        matches!(self, BehaviorKind::WanderElement | BehaviorKind::Element)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Follow => "follow",
            BehaviorKind::Wander => "wander",
            BehaviorKind::WanderElement => "wander_element",
            BehaviorKind::Element => "element",
        }
    }
}

impl FromStr for BehaviorKind {
    type Err = BuddyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(BehaviorKind::Follow),
            "wander" => Ok(BehaviorKind::Wander),
            "wander_element" => Ok(BehaviorKind::WanderElement),
            "element" => Ok(BehaviorKind::Element),
            other => Err(BuddyError::UnknownBehavior(other.to_string())),
        }
    }
}

impl std::fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behavior descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSettings {
    #[serde(rename = "type")]
    pub kind: BehaviorKind,

    /// Milliseconds between repositions.
    pub rate: i64,

    /// Pixels of jitter around each target.
    #[serde(default)]
    pub drift: f64,

    /// Maximum travel per tick when wandering.
    #[serde(default)]
    pub limit: Option<f64>,

    /// How close to the reference point a follower stays.
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Element gravitated to by `element` and `wander_element`.
    #[serde(default)]
    pub element: Option<ElementRef>,

    /// Hold still while an overlay is open.
    #[serde(default)]
    pub mui_pause: bool,
}

impl BehaviorSettings {
    pub fn new(kind: BehaviorKind, rate: i64) -> Self {
        Self {
            kind,
            rate,
            drift: 0.0,
            limit: None,
            threshold: None,
            element: None,
            mui_pause: false,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_element(mut self, element: ElementRef) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_mui_pause(mut self, pause: bool) -> Self {
        self.mui_pause = pause;
        self
    }
}

/// Reject non-positive rates.
pub fn validate_rate(rate: i64) -> Result<u64, BuddyError> {
    u64::try_from(rate)
        .ok()
        .filter(|rate| *rate > 0)
        .ok_or(BuddyError::InvalidRate(rate))
}

/// Engine run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// What the engine can see of the page on a given tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surroundings {
    pub cursor: Option<Position>,
    pub page: Rect,
    /// Bounds of the gravitation target, if it is on the page.
    pub anchor: Option<Rect>,
}

/// A behavior instance bound to one buddy.
#[derive(Debug, Clone)]
pub struct BehaviorEngine {
    settings: BehaviorSettings,
    state: EngineState,
    speed_ms: Option<u64>,
}

impl BehaviorEngine {
    pub fn new(settings: BehaviorSettings) -> Self {
        Self {
            settings,
            state: EngineState::Idle,
            speed_ms: None,
        }
    }

    pub fn settings(&self) -> &BehaviorSettings {
        &self.settings
    }

    pub fn kind(&self) -> BehaviorKind {
        self.settings.kind
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != EngineState::Idle
    }

    /// Start running. Fails on a non-positive rate; returns the tick interval.
    pub fn activate(&mut self) -> Result<u64, BuddyError> {
        let rate = validate_rate(self.settings.rate)?;
        self.state = EngineState::Running;
        Ok(rate)
    }

    /// Follow the pause condition. Returns true if the state changed.
    pub fn sync_pause(&mut self, overlay_open: bool) -> bool {
        let next = match self.state {
            EngineState::Running if overlay_open && self.settings.mui_pause => EngineState::Paused,
            EngineState::Paused if !overlay_open || !self.settings.mui_pause => EngineState::Running,
            current => current,
        };
        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Stop; the engine can be activated again later.
    pub fn clear(&mut self) {
        self.state = EngineState::Idle;
    }

    /// Tick interval, once validated.
    pub fn rate_ms(&self) -> Result<u64, BuddyError> {
        validate_rate(self.settings.rate)
    }

    /// Change the tick interval. Applies from the next tick.
    pub fn set_rate(&mut self, rate: i64) -> Result<(), BuddyError> {
        validate_rate(rate)?;
        self.settings.rate = rate;
        Ok(())
    }

    /// Animation duration for each move; defaults to the rate.
    pub fn speed_ms(&self) -> u64 {
        self.speed_ms
            .unwrap_or_else(|| validate_rate(self.settings.rate).unwrap_or_default())
    }

    pub fn set_speed(&mut self, speed_ms: u64) {
        self.speed_ms = Some(speed_ms);
    }

    /// Where to go next, or `None` to hold position this tick.
    pub fn next_target<R>(
        &self,
        current: Position,
        surroundings: &Surroundings,
        rng: &mut R,
    ) -> Option<Position>
    where
        R: Rng + ?Sized,
    {
        if self.state != EngineState::Running {
            return None;
        }

        let settings = &self.settings;
        let threshold = settings.threshold.unwrap_or(DEFAULT_THRESHOLD);
        match settings.kind {
            BehaviorKind::Follow => {
                let reference = surroundings.cursor?;
                approach(current, reference, threshold, settings.drift, surroundings.page, rng)
            }
            BehaviorKind::Element => {
                let reference = surroundings.anchor?.center();
                approach(current, reference, threshold, settings.drift, surroundings.page, rng)
            }
            BehaviorKind::Wander => roam(
                current,
                surroundings.page,
                settings.limit,
                settings.drift,
                rng,
            ),
            BehaviorKind::WanderElement => {
                let area = surroundings.anchor?;
                roam(current, area, settings.limit, settings.drift, rng)
            }
        }
    }
}
