use super::*;
use crate::behavior::{BehaviorKind, BehaviorSettings};
use crate::geometry::Rect;
use crate::headless::HeadlessStage;
use crate::stage::ElementRef;
use site_state::{SaveState, SignalBus};
use std::cell::Cell;

struct Fixture {
    stage: Rc<HeadlessStage>,
    scheduler: Scheduler,
    store: SaveStore,
    ctx: BuddyContext,
}

fn fixture() -> Fixture {
    let stage = Rc::new(HeadlessStage::new());
    let scheduler = Scheduler::new();
    let store = SaveStore::new(SaveState::new(), SignalBus::new());
    let ctx = BuddyContext::new(stage.clone(), scheduler.clone(), store.clone()).with_seed(7);
    Fixture {
        stage,
        scheduler,
        store,
        ctx,
    }
}

fn wanderer(id: &str) -> BuddySettings {
    BuddySettings::new(
        ElementSettings::new(id),
        BehaviorSettings::new(BehaviorKind::Wander, 1000).with_limit(50.0),
    )
}

fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
    let hits = Rc::new(Cell::new(0));
    let inner = hits.clone();
    (hits, move || inner.set(inner.get() + 1))
}

#[test]
fn test_render_puts_buddy_on_page() {
    let fx = fixture();
    let (rendered, on_render) = counter();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().on_render(on_render),
        fx.ctx.clone(),
    )
    .unwrap();
    assert_eq!(buddy.lifecycle(), LifecycleState::Unrendered);

    buddy.render().unwrap();

    let element = buddy.element().unwrap();
    assert_eq!(fx.stage.find("funfriend"), Some(element));
    assert_eq!(rendered.get(), 1);
    assert_eq!(buddy.position(), Some(Position::new(640.0, 400.0)));
    assert!(fx.stage.is_observed(element));
    assert_eq!(buddy.lifecycle(), LifecycleState::RenderedActive);
    assert_eq!(buddy.behavior_state(), EngineState::Running);
}

#[test]
fn test_render_twice_is_noop() {
    let fx = fixture();
    let (rendered, on_render) = counter();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().on_render(on_render),
        fx.ctx.clone(),
    )
    .unwrap();

    buddy.render().unwrap();
    let element = buddy.element();
    buddy.render().unwrap();

    assert_eq!(rendered.get(), 1);
    assert_eq!(fx.stage.mounted_count(), 1);
    assert_eq!(buddy.element(), element);
    assert_eq!(buddy.active_timers(), 1);
}

#[test]
fn test_remove_cancels_everything() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let element = buddy.element().unwrap();

    let (fired, callback) = counter();
    buddy.set_timeout(10, callback);
    let (ticked, interval) = counter();
    buddy.set_interval(5, interval);

    buddy.remove(RemoveOptions::new(true, false));
    fx.scheduler.advance(60_000);

    assert_eq!(fired.get(), 0);
    assert_eq!(ticked.get(), 0);
    assert!(fx.stage.moves_of(element).is_empty());
    assert_eq!(fx.stage.detached(), vec![element]);
    assert!(!fx.stage.is_observed(element));
    assert_eq!(buddy.lifecycle(), LifecycleState::Removed);
    assert_eq!(buddy.active_timers(), 0);
    assert_eq!(fx.scheduler.pending(), 0);
}

#[test]
fn test_remove_is_idempotent() {
    let fx = fixture();
    let (left, leaving) = counter();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().leaving(leaving),
        fx.ctx.clone(),
    )
    .unwrap();

    // Never rendered: nothing to tear down.
    buddy.remove(RemoveOptions::new(true, true));
    assert_eq!(left.get(), 0);

    buddy.render().unwrap();
    buddy.remove(RemoveOptions::new(true, true));
    buddy.remove(RemoveOptions::new(true, true));

    assert_eq!(left.get(), 1);
    assert_eq!(fx.stage.detached().len(), 1);
}

#[test]
fn test_remove_keeping_element() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();

    buddy.remove(RemoveOptions::new(false, false));

    assert!(buddy.element().is_none());
    assert_eq!(fx.stage.mounted_count(), 1);
    assert!(fx.stage.detached().is_empty());
}

#[test]
fn test_rerender_after_remove() {
    let fx = fixture();
    let (rendered, on_render) = counter();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().on_render(on_render),
        fx.ctx.clone(),
    )
    .unwrap();

    buddy.render().unwrap();
    buddy.remove(RemoveOptions::new(true, false));
    buddy.render().unwrap();
    fx.scheduler.advance(1000);

    assert_eq!(rendered.get(), 2);
    assert_eq!(buddy.lifecycle(), LifecycleState::RenderedActive);
    assert_eq!(fx.stage.moves_of(buddy.element().unwrap()).len(), 1);
}

#[test]
fn test_leaving_hook_cannot_leak_timers() {
    let fx = fixture();
    let slot: Rc<RefCell<Option<Buddy>>> = Rc::new(RefCell::new(None));

    let own = slot.clone();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().leaving(move || {
            if let Some(buddy) = own.borrow().as_ref() {
                buddy.chatter(ChatterOptions::new("bye"));
                buddy.remove(RemoveOptions::new(true, true));
            }
        }),
        fx.ctx.clone(),
    )
    .unwrap();
    *slot.borrow_mut() = Some(buddy.clone());

    buddy.render().unwrap();
    buddy.remove(RemoveOptions::new(true, true));

    assert_eq!(fx.scheduler.pending(), 0);
    assert_eq!(fx.stage.chat_log(), vec![("funfriend".to_string(), "bye".to_string())]);
    assert_eq!(buddy.lifecycle(), LifecycleState::Removed);
    slot.borrow_mut().take();
}

#[test]
fn test_page_agnostic_buddy_always_on_page() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();

    assert!(buddy.should_be_on_page());
    fx.store.enter_page("/anywhere/");
    assert!(buddy.should_be_on_page());
    assert!(buddy.set_new_location(None).is_none());
}

#[test]
fn test_location_excluding_current_path() {
    let fx = fixture();
    let buddy = Buddy::new(
        wanderer("funfriend").with_location(LocationSettings::new("/local/ocean/")),
        BuddyEvents::new(),
        fx.ctx.clone(),
    )
    .unwrap();

    fx.store.enter_page("/hub/");
    assert!(!buddy.should_be_on_page());

    buddy.set_new_location(None);
    assert!(!buddy.should_be_on_page());
}

#[test]
fn test_explored_only_location() {
    let fx = fixture();
    let paths = vec!["/a/".to_string(), "/b/".to_string()];
    let buddy = Buddy::new(
        wanderer("funfriend").with_location(LocationSettings::new(paths).explored_only()),
        BuddyEvents::new(),
        fx.ctx.clone(),
    )
    .unwrap();

    assert!(buddy.set_new_location(None).is_none());
    assert!(buddy.current_location().is_none());

    fx.store.update(|save| save.mark_explored("/b/"));
    assert_eq!(buddy.set_new_location(None).as_deref(), Some("/b/"));

    fx.store.enter_page("/b/");
    assert!(buddy.should_be_on_page());
    fx.store.enter_page("/a/");
    assert!(!buddy.should_be_on_page());
}

#[test]
fn test_specific_location() {
    let fx = fixture();
    let paths = vec!["/a/".to_string(), "/b/".to_string()];
    let buddy = Buddy::new(
        wanderer("funfriend").with_location(LocationSettings::new(paths)),
        BuddyEvents::new(),
        fx.ctx.clone(),
    )
    .unwrap();

    assert_eq!(buddy.set_new_location(Some("/a/")).as_deref(), Some("/a/"));
    assert_eq!(buddy.current_location().as_deref(), Some("/a/"));
}

#[test]
fn test_wander_steps_within_limit() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("wanderer"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let start = buddy.position().unwrap();

    fx.scheduler.advance(5000);

    let moves = fx.stage.moves_of(buddy.element().unwrap());
    assert_eq!(moves.len(), 5);
    let mut previous = start;
    for position in moves {
        assert!(position.distance(previous) <= 50.0 + 1e-6);
        previous = position;
    }
    assert_eq!(buddy.position(), Some(previous));
}

#[test]
fn test_broken_page_bounds_skip_ticks() {
    let stage = Rc::new(HeadlessStage::with_bounds(
        Rect::new(0.0, 0.0, 1280.0, 800.0),
        Rect::new(0.0, 0.0, f64::NAN, 4000.0),
    ));
    let scheduler = Scheduler::new();
    let store = SaveStore::new(SaveState::new(), SignalBus::new());
    let ctx = BuddyContext::new(stage.clone(), scheduler.clone(), store).with_seed(7);
    let buddy = Buddy::new(wanderer("wanderer"), BuddyEvents::new(), ctx).unwrap();
    buddy.render().unwrap();

    scheduler.advance(3000);

    assert!(stage.moves_of(buddy.element().unwrap()).is_empty());
    assert_eq!(buddy.position(), Some(Position::new(640.0, 400.0)));
    assert_eq!(buddy.behavior_state(), EngineState::Running);
}

#[test]
fn test_follow_closes_on_cursor() {
    let fx = fixture();
    let settings = BuddySettings::new(
        ElementSettings::new("funfriend"),
        BehaviorSettings::new(BehaviorKind::Follow, 200).with_threshold(30.0),
    );
    let buddy = Buddy::new(settings, BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();

    let cursor = Position::new(100.0, 2500.0);
    fx.stage.set_cursor(Some(cursor));
    fx.scheduler.advance(200);

    let position = buddy.position().unwrap();
    assert!(position.distance(cursor) <= 30.0 + 1e-9);

    // Already close: later ticks hold still.
    fx.scheduler.advance(1000);
    assert_eq!(fx.stage.moves_of(buddy.element().unwrap()).len(), 1);
}

#[test]
fn test_element_behavior_waits_for_anchor() {
    let fx = fixture();
    let settings = BuddySettings::new(
        ElementSettings::new("moth"),
        BehaviorSettings::new(BehaviorKind::Element, 100)
            .with_element(ElementRef::new("#lamp"))
            .with_threshold(5.0),
    );
    let buddy = Buddy::new(settings, BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let element = buddy.element().unwrap();

    fx.scheduler.advance(500);
    assert!(fx.stage.moves_of(element).is_empty());
    assert_eq!(buddy.behavior_state(), EngineState::Running);

    let lamp = Rect::new(900.0, 100.0, 20.0, 20.0);
    fx.stage.place_anchor("#lamp", lamp);
    fx.scheduler.advance(100);

    assert_eq!(fx.stage.moves_of(element).len(), 1);
    assert!(buddy.position().unwrap().distance(lamp.center()) <= 5.0 + 1e-9);

    fx.stage.remove_anchor("#lamp");
    fx.scheduler.advance(500);
    assert_eq!(fx.stage.moves_of(element).len(), 1);
    assert!(buddy.is_rendered());
}

#[test]
fn test_missing_anchor_rejected() {
    let fx = fixture();
    let settings = BuddySettings::new(
        ElementSettings::new("moth"),
        BehaviorSettings::new(BehaviorKind::WanderElement, 100),
    );

    let result = Buddy::new(settings, BuddyEvents::new(), fx.ctx.clone());
    assert!(matches!(result, Err(BuddyError::MissingAnchor { id }) if id == "moth"));
}

#[test]
fn test_invalid_rate_rejected_at_activation() {
    let fx = fixture();
    let settings = BuddySettings::new(
        ElementSettings::new("stuck"),
        BehaviorSettings::new(BehaviorKind::Wander, 0),
    );
    let buddy = Buddy::new(settings, BuddyEvents::new(), fx.ctx.clone()).unwrap();

    assert!(matches!(buddy.render(), Err(BuddyError::InvalidRate(0))));
    assert_eq!(buddy.behavior_state(), EngineState::Idle);
    assert_eq!(fx.scheduler.pending(), 0);
}

#[test]
fn test_overlay_pauses_movement() {
    let fx = fixture();
    let settings = BuddySettings::new(
        ElementSettings::new("funfriend"),
        BehaviorSettings::new(BehaviorKind::Wander, 100).with_mui_pause(true),
    );
    let buddy = Buddy::new(settings, BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let element = buddy.element().unwrap();

    fx.stage.set_overlay_open(true);
    assert!(buddy.sync_pause());
    assert_eq!(buddy.lifecycle(), LifecycleState::RenderedPaused);
    fx.scheduler.advance(1000);
    assert!(fx.stage.moves_of(element).is_empty());

    fx.stage.set_overlay_open(false);
    fx.scheduler.advance(100);
    assert_eq!(buddy.lifecycle(), LifecycleState::RenderedActive);
    assert_eq!(fx.stage.moves_of(element).len(), 1);
}

#[test]
fn test_change_rate_applies_next_tick() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let element = buddy.element().unwrap();

    buddy.change_rate(100).unwrap();
    fx.scheduler.advance(1000);
    assert_eq!(fx.stage.moves_of(element).len(), 1);

    fx.scheduler.advance(1000);
    assert_eq!(fx.stage.moves_of(element).len(), 11);

    assert!(matches!(buddy.change_rate(-10), Err(BuddyError::InvalidRate(-10))));
}

#[test]
fn test_change_speed_keeps_position() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let before = buddy.position();

    buddy.change_speed(250);

    assert_eq!(buddy.position(), before);
    assert_eq!(buddy.behavior_state(), EngineState::Running);
}

#[test]
fn test_clear_behavior_stops_ticks() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();

    buddy.clear_behavior();
    fx.scheduler.advance(5000);

    assert!(fx.stage.moves_of(buddy.element().unwrap()).is_empty());
    assert_eq!(buddy.behavior_state(), EngineState::Idle);

    buddy.activate_behavior().unwrap();
    fx.scheduler.advance(1000);
    assert_eq!(fx.stage.moves_of(buddy.element().unwrap()).len(), 1);
}

#[test]
fn test_set_position_single_axis() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();

    buddy.set_position(Some(10.0), None);
    assert_eq!(buddy.position(), Some(Position::new(10.0, 400.0)));

    let element = buddy.element().unwrap();
    assert_eq!(
        fx.stage.element(element).unwrap().position,
        Some(Position::new(10.0, 400.0))
    );
}

#[test]
fn test_screen_enter_once_per_transition() {
    let fx = fixture();
    let (entered, screen_enter) = counter();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().screen_enter(screen_enter),
        fx.ctx.clone(),
    )
    .unwrap();

    // Reports before rendering are ignored.
    buddy.report_intersection(true);
    assert_eq!(entered.get(), 0);

    buddy.render().unwrap();
    buddy.report_intersection(true);
    buddy.report_intersection(true);
    assert_eq!(entered.get(), 1);

    buddy.report_intersection(false);
    buddy.report_intersection(true);
    assert_eq!(entered.get(), 2);

    buddy.deactivate_observer();
    buddy.report_intersection(false);
    buddy.report_intersection(true);
    assert_eq!(entered.get(), 2);
}

#[test]
fn test_chatter_clears_after_duration() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let element = buddy.element().unwrap();

    buddy.chatter(ChatterOptions::new("hello!").with_readout(true));
    assert_eq!(fx.stage.element(element).unwrap().chatter.as_deref(), Some("hello!"));
    assert_eq!(fx.stage.chat_log().len(), 1);
    assert_eq!(fx.stage.readouts(), vec!["hello!".to_string()]);

    fx.scheduler.advance(5999);
    assert!(fx.stage.element(element).unwrap().chatter.is_some());
    fx.scheduler.advance(1);
    assert!(fx.stage.element(element).unwrap().chatter.is_none());

    // Movement was not disturbed.
    assert_eq!(fx.stage.moves_of(element).len(), 6);
}

#[test]
fn test_newer_chatter_survives_older_timer() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();
    buddy.render().unwrap();
    let element = buddy.element().unwrap();

    buddy.chatter(ChatterOptions::new("first").with_duration(1000).with_log(false));
    fx.scheduler.advance(500);
    buddy.chatter(ChatterOptions::new("second").with_duration(1000).with_log(false));
    fx.scheduler.advance(600);

    assert_eq!(fx.stage.element(element).unwrap().chatter.as_deref(), Some("second"));
    assert!(fx.stage.chat_log().is_empty());
}

#[test]
fn test_chatter_when_unrendered_is_ignored() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();

    buddy.chatter(ChatterOptions::new("anyone?"));

    assert!(fx.stage.chat_log().is_empty());
    assert_eq!(fx.scheduler.pending(), 0);
}

#[test]
fn test_page_enter_fires_once_per_page() {
    let fx = fixture();
    let (entered, page_enter) = counter();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().page_enter(page_enter),
        fx.ctx.clone(),
    )
    .unwrap();

    assert!(!buddy.enter_page());
    buddy.render().unwrap();
    assert!(buddy.enter_page());
    assert!(!buddy.enter_page());
    assert_eq!(entered.get(), 1);

    buddy.remove(RemoveOptions::new(true, false));
    buddy.render().unwrap();
    assert!(buddy.enter_page());
    assert_eq!(entered.get(), 2);
}

#[test]
fn test_mouse_enter_only_while_rendered() {
    let fx = fixture();
    let (entered, mouse_enter) = counter();
    let buddy = Buddy::new(
        wanderer("funfriend"),
        BuddyEvents::new().mouse_enter(mouse_enter),
        fx.ctx.clone(),
    )
    .unwrap();

    buddy.notify_mouse_enter();
    buddy.render().unwrap();
    buddy.notify_mouse_enter();

    assert_eq!(entered.get(), 1);
}

#[test]
fn test_clear_timeouts_and_intervals() {
    let fx = fixture();
    let buddy = Buddy::new(wanderer("funfriend"), BuddyEvents::new(), fx.ctx.clone()).unwrap();

    let (once, timeout) = counter();
    let (repeat, interval) = counter();
    buddy.set_timeout(10, timeout);
    buddy.set_interval(10, interval);

    buddy.clear_intervals();
    fx.scheduler.advance(100);
    assert_eq!(once.get(), 1);
    assert_eq!(repeat.get(), 0);

    let (late, timeout) = counter();
    buddy.set_timeout(10, timeout);
    buddy.clear_timeouts();
    fx.scheduler.advance(100);
    assert_eq!(late.get(), 0);
}
