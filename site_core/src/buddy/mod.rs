//! Buddies - floating, active entities that appear throughout the site.
//!
//! At their core they are an element with a position, a behavior that moves
//! it every so often, and a chatterbox. A buddy is built once from immutable
//! settings and may be rendered and removed many times, for example a global
//! buddy that is re-evaluated on every page load.
//!
//! Lifecycle: `unrendered -> rendered (active | paused) -> removed`, and
//! `removed -> rendered` again on a later page.

mod settings;
mod visibility;

pub use settings::*;
pub use visibility::*;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use site_state::SaveStore;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::behavior::{BehaviorEngine, EngineState, Surroundings};
use crate::error::BuddyError;
use crate::geometry::Position;
use crate::location::select_location;
use crate::stage::{ElementHandle, Stage};
use crate::timers::{Scheduler, TimerHandle, TimerTracker};
use settings::Hook;

/// Random source shared by every buddy on a site.
pub type SharedRng = Rc<RefCell<ChaCha8Rng>>;

/// Collaborators a buddy needs from its host.
#[derive(Clone)]
pub struct BuddyContext {
    pub stage: Rc<dyn Stage>,
    pub scheduler: Scheduler,
    pub store: SaveStore,
    pub rng: SharedRng,
}

impl BuddyContext {
    /// Context with an entropy-seeded random source.
    pub fn new(stage: Rc<dyn Stage>, scheduler: Scheduler, store: SaveStore) -> Self {
        Self {
            stage,
            scheduler,
            store,
            rng: Rc::new(RefCell::new(ChaCha8Rng::from_entropy())),
        }
    }

    /// Replace the random source with a seeded one, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed)));
        self
    }
}

impl std::fmt::Debug for BuddyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuddyContext")
            .field("scheduler", &self.scheduler)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Identifies one buddy instance, independent of its element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuddyKey(pub Uuid);

impl BuddyKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BuddyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuddyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unrendered,
    RenderedActive,
    RenderedPaused,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unrendered,
    Rendered,
    /// Inside `remove`, while the `leaving` hook runs.
    Removing,
    Removed,
}

struct BuddyState {
    key: BuddyKey,
    settings: BuddySettings,
    events: BuddyEvents,
    ctx: BuddyContext,
    phase: Phase,
    current_location: Option<String>,
    element: Option<ElementHandle>,
    xy: Option<Position>,
    engine: BehaviorEngine,
    timers: TimerTracker,
    behavior_timer: Option<TimerHandle>,
    visibility: VisibilityTracker,
    chatter_generation: u64,
    page_entered: bool,
}

impl BuddyState {
    fn cancel_behavior_timer(&mut self) {
        if let Some(handle) = self.behavior_timer.take() {
            self.timers.cancel(handle);
        }
    }
}

/// Handle to a buddy. Cloning yields another handle to the same buddy.
#[derive(Clone)]
pub struct Buddy {
    inner: Rc<RefCell<BuddyState>>,
}

impl Buddy {
    /// Build a buddy. Nothing is put on the page until [`Buddy::render`].
    pub fn new(
        settings: BuddySettings,
        events: BuddyEvents,
        ctx: BuddyContext,
    ) -> Result<Self, BuddyError> {
        if settings.behavior.kind.needs_anchor() && settings.behavior.element.is_none() {
            return Err(BuddyError::MissingAnchor {
                id: settings.element.id.clone(),
            });
        }

        let timers = TimerTracker::new(ctx.scheduler.clone());
        let engine = BehaviorEngine::new(settings.behavior.clone());
        Ok(Self {
            inner: Rc::new(RefCell::new(BuddyState {
                key: BuddyKey::new(),
                settings,
                events,
                ctx,
                phase: Phase::Unrendered,
                current_location: None,
                element: None,
                xy: None,
                engine,
                timers,
                behavior_timer: None,
                visibility: VisibilityTracker::new(),
                chatter_generation: 0,
                page_entered: false,
            })),
        })
    }

    pub fn key(&self) -> BuddyKey {
        self.inner.borrow().key
    }

    /// Element id from the settings.
    pub fn id(&self) -> String {
        self.inner.borrow().settings.element.id.clone()
    }

    pub fn is_global(&self) -> bool {
        self.inner.borrow().settings.global
    }

    pub fn settings(&self) -> BuddySettings {
        self.inner.borrow().settings.clone()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        let state = self.inner.borrow();
        match state.phase {
            Phase::Unrendered => LifecycleState::Unrendered,
            Phase::Removed => LifecycleState::Removed,
            Phase::Rendered | Phase::Removing => match state.engine.state() {
                EngineState::Paused => LifecycleState::RenderedPaused,
                _ => LifecycleState::RenderedActive,
            },
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.inner.borrow().phase == Phase::Rendered
    }

    /// The buddy's element while rendered.
    pub fn element(&self) -> Option<ElementHandle> {
        self.inner.borrow().element
    }

    pub fn position(&self) -> Option<Position> {
        self.inner.borrow().xy
    }

    pub fn current_location(&self) -> Option<String> {
        self.inner.borrow().current_location.clone()
    }

    /// Whether movement is running, paused or stopped.
    pub fn behavior_state(&self) -> EngineState {
        self.inner.borrow().engine.state()
    }

    /// Timers this buddy has pending.
    pub fn active_timers(&self) -> usize {
        self.inner.borrow().timers.active_count()
    }

    fn fire(&self, pick: impl FnOnce(&BuddyEvents) -> Option<Hook>) {
        let hook = pick(&self.inner.borrow().events);
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Reroll the location from the configured paths, or take `specific`
    /// if it is one of them. `None` if nowhere is eligible or the buddy is
    /// not tied to any location.
    pub fn set_new_location(&self, specific: Option<&str>) -> Option<String> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        let location = state.settings.location.clone()?;
        let store = state.ctx.store.clone();

        let chosen = select_location(
            &location.path,
            |path| store.has_explored(path),
            location.explored_only,
            specific,
            &mut *state.ctx.rng.borrow_mut(),
        );
        debug!(buddy = %state.settings.element.id, location = ?chosen, "location_selected");
        state.current_location = chosen.clone();
        chosen
    }

    /// Whether the buddy belongs on the page currently displayed.
    pub fn should_be_on_page(&self) -> bool {
        let state = self.inner.borrow();
        let Some(location) = &state.settings.location else {
            return true;
        };
        let Some(current) = state.ctx.store.current_path() else {
            return false;
        };
        match &state.current_location {
            Some(selected) => *selected == current,
            None => {
                location.path.contains(&current)
                    && (!location.explored_only || state.ctx.store.has_explored(&current))
            }
        }
    }

    /// Put the buddy on the page and set it moving. No-op while rendered.
    ///
    /// Fails if the behavior rate is not positive; the element stays up
    /// but does not move.
    pub fn render(&self) -> Result<(), BuddyError> {
        {
            let mut state = self.inner.borrow_mut();
            if !matches!(state.phase, Phase::Unrendered | Phase::Removed) {
                return Ok(());
            }
            let element = state.ctx.stage.mount(&state.settings.element);
            state.element = Some(element);
            state.phase = Phase::Rendered;
            state.page_entered = false;
            info!(
                buddy = %state.settings.element.id,
                location = ?state.current_location,
                "buddy_rendered"
            );
        }

        self.fire(|events| events.on_render.clone());
        self.center();
        self.activate_observer();
        self.activate_behavior()
    }

    /// Tear the buddy down. No-op unless rendered.
    ///
    /// Every timer the buddy scheduled is cancelled; none of them runs
    /// afterwards.
    pub fn remove(&self, options: RemoveOptions) {
        {
            let mut state = self.inner.borrow_mut();
            if state.phase != Phase::Rendered {
                return;
            }
            state.phase = Phase::Removing;
        }

        if options.leaving {
            self.fire(|events| events.leaving.clone());
        }

        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        let stage = state.ctx.stage.clone();

        state.behavior_timer = None;
        state.engine.clear();
        if let (Some(element), true) = (state.element, state.visibility.is_observing()) {
            stage.unobserve(element);
        }
        state.visibility.stop();
        state.timers.cancel_all();

        let element = state.element.take();
        if options.remove_el {
            if let Some(element) = element {
                stage.detach(element);
            }
        }
        state.phase = Phase::Removed;
        state.page_entered = false;
        info!(
            buddy = %state.settings.element.id,
            detached = options.remove_el,
            "buddy_removed"
        );
    }

    /// Start ticking the behavior. No-op unless rendered.
    pub fn activate_behavior(&self) -> Result<(), BuddyError> {
        let rate = {
            let mut state = self.inner.borrow_mut();
            if state.phase != Phase::Rendered {
                return Ok(());
            }
            state.cancel_behavior_timer();
            let rate = state.engine.activate()?;
            let overlay_open = state.ctx.stage.overlay_open();
            state.engine.sync_pause(overlay_open);
            rate
        };
        self.schedule_tick(rate);
        Ok(())
    }

    /// Stop ticking the behavior. The buddy holds its position.
    pub fn clear_behavior(&self) {
        let mut state = self.inner.borrow_mut();
        state.cancel_behavior_timer();
        state.engine.clear();
    }

    fn schedule_tick(&self, delay_ms: u64) {
        let weak = Rc::downgrade(&self.inner);
        let mut state = self.inner.borrow_mut();
        let handle = state.timers.schedule(delay_ms, move || {
            if let Some(inner) = weak.upgrade() {
                Buddy { inner }.tick();
            }
        });
        state.behavior_timer = Some(handle);
    }

    fn tick(&self) {
        self.run_behavior();
        let next = {
            let state = self.inner.borrow();
            if state.phase == Phase::Rendered && state.engine.is_active() {
                state.engine.rate_ms().ok()
            } else {
                None
            }
        };
        if let Some(rate) = next {
            self.schedule_tick(rate);
        }
    }

    /// Run one behavior step: pick a target and move there.
    pub fn run_behavior(&self) {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        if state.phase != Phase::Rendered {
            return;
        }
        let Some(element) = state.element else {
            return;
        };
        let stage = state.ctx.stage.clone();

        state.engine.sync_pause(stage.overlay_open());
        if state.engine.state() != EngineState::Running {
            debug!(buddy = %state.settings.element.id, state = ?state.engine.state(), "behavior_held");
            return;
        }

        let surroundings = Surroundings {
            cursor: stage.cursor(),
            page: stage.page_bounds(),
            anchor: state
                .engine
                .settings()
                .element
                .as_ref()
                .and_then(|target| stage.element_rect(target)),
        };
        let current = state.xy.unwrap_or_else(|| stage.viewport().center());
        let target =
            state
                .engine
                .next_target(current, &surroundings, &mut *state.ctx.rng.borrow_mut());

        match target {
            Some(target) => {
                stage.move_to(element, target, state.engine.speed_ms());
                state.xy = Some(target);
            }
            None => {
                debug!(buddy = %state.settings.element.id, kind = %state.engine.kind(), "behavior_tick_skipped");
            }
        }
    }

    /// Re-check the pause condition. True if the behavior paused or resumed.
    pub fn sync_pause(&self) -> bool {
        let mut state = self.inner.borrow_mut();
        if state.phase != Phase::Rendered {
            return false;
        }
        let overlay_open = state.ctx.stage.overlay_open();
        state.engine.sync_pause(overlay_open)
    }

    /// Change the time between repositions, from the next tick on.
    pub fn change_rate(&self, rate: i64) -> Result<(), BuddyError> {
        self.inner.borrow_mut().engine.set_rate(rate)
    }

    /// Change how long each move animates.
    pub fn change_speed(&self, speed_ms: u64) {
        self.inner.borrow_mut().engine.set_speed(speed_ms);
    }

    /// Jump to a position; either axis may be left as is.
    pub fn set_position(&self, x: Option<f64>, y: Option<f64>) {
        let mut state = self.inner.borrow_mut();
        let current = state.xy.unwrap_or_default();
        let next = Position::new(x.unwrap_or(current.x), y.unwrap_or(current.y));
        state.xy = Some(next);
        if let Some(element) = state.element {
            state.ctx.stage.move_to(element, next, 0);
        }
    }

    /// Jump to the middle of the viewport.
    pub fn center(&self) {
        let center = self.inner.borrow().ctx.stage.viewport().center();
        self.set_position(Some(center.x), Some(center.y));
    }

    /// Start watching whether the element is on screen.
    pub fn activate_observer(&self) {
        let mut state = self.inner.borrow_mut();
        let Some(element) = state.element else {
            return;
        };
        if !state.visibility.is_observing() {
            state.visibility.start();
            state.ctx.stage.observe(element);
        }
    }

    pub fn deactivate_observer(&self) {
        let mut state = self.inner.borrow_mut();
        if !state.visibility.is_observing() {
            return;
        }
        state.visibility.stop();
        if let Some(element) = state.element {
            state.ctx.stage.unobserve(element);
        }
    }

    /// Intersection report from the host. Fires `screen_enter` on the
    /// offscreen to onscreen edge only.
    pub fn report_intersection(&self, intersecting: bool) {
        let entered = self.inner.borrow_mut().visibility.report(intersecting);
        if entered {
            self.fire(|events| events.screen_enter.clone());
        }
    }

    /// Fire `page_enter`, once per page the buddy is rendered on.
    pub fn enter_page(&self) -> bool {
        {
            let mut state = self.inner.borrow_mut();
            if state.phase != Phase::Rendered || state.page_entered {
                return false;
            }
            state.page_entered = true;
        }
        self.fire(|events| events.page_enter.clone());
        true
    }

    /// The cursor entered the page.
    pub fn notify_mouse_enter(&self) {
        if self.is_rendered() {
            self.fire(|events| events.mouse_enter.clone());
        }
    }

    /// Show text next to the buddy for a while. Movement carries on.
    pub fn chatter(&self, options: ChatterOptions) {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        let Some(element) = state.element else {
            debug!(buddy = %state.settings.element.id, "chatter ignored while not rendered");
            return;
        };
        let stage = state.ctx.stage.clone();

        state.chatter_generation += 1;
        let generation = state.chatter_generation;
        stage.show_chatter(element, &options.text);
        if options.log {
            stage.log_chatter(state.settings.element.speaker(), &options.text);
        }
        if options.readout {
            stage.readout(&options.text);
        }

        let weak = Rc::downgrade(&self.inner);
        state.timers.schedule(options.duration_ms, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let state = inner.borrow();
            // A newer chatter owns the bubble now.
            if state.chatter_generation == generation {
                if let Some(element) = state.element {
                    state.ctx.stage.clear_chatter(element);
                }
            }
        });
    }

    /// Schedule a one-shot callback cancelled with the buddy.
    pub fn set_timeout(&self, delay_ms: u64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.inner.borrow_mut().timers.schedule(delay_ms, callback)
    }

    /// Schedule a repeating callback cancelled with the buddy.
    pub fn set_interval(&self, every_ms: u64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.inner
            .borrow_mut()
            .timers
            .schedule_repeating(every_ms, callback)
    }

    /// Cancel the buddy's one-shot callbacks, behavior ticks included.
    pub fn clear_timeouts(&self) {
        let mut state = self.inner.borrow_mut();
        state.behavior_timer = None;
        state.timers.clear_timeouts();
    }

    pub fn clear_intervals(&self) {
        self.inner.borrow_mut().timers.clear_intervals();
    }
}

impl std::fmt::Debug for Buddy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Buddy")
            .field("key", &state.key)
            .field("id", &state.settings.element.id)
            .field("phase", &state.phase)
            .field("location", &state.current_location)
            .field("xy", &state.xy)
            .finish()
    }
}

#[cfg(test)]
mod tests;
