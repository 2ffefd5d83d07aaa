//! Reactive objective list.
//!
//! The list subscribes to [`Signal::StateChanged`] on construction and
//! re-checks every objective on each dispatch. It tears itself down on
//! [`Signal::PageLeaving`].

use site_state::{SaveState, SaveStore, Signal, SubscriptionId};
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::rc::{Rc, Weak};
use tracing::{debug, error};

use super::{Effect, Objective, ObjectiveId};
use crate::error::ObjectiveError;

/// A rendered row of the objective list.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveEntry {
    pub id: ObjectiveId,
    pub name: String,
    pub progress: Option<String>,
    pub definition: Option<String>,
    pub completed: bool,
    pub priority: i32,
}

/// Evaluation result for one objective, in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectiveStatus {
    pub id: ObjectiveId,
    pub name: String,
    pub completed: bool,
    pub shown: bool,
}

/// Where a list draws itself.
pub trait ObjectiveSurface {
    /// Replace the displayed entries.
    fn render(&mut self, entries: &[ObjectiveEntry]);

    /// Remove the view from the page.
    fn detach(&mut self);
}

/// Outcome of one evaluation pass, with the effects still to run.
struct Pass {
    result: Result<(), ObjectiveError>,
    effects: Vec<(usize, Effect)>,
}

struct ListInner {
    objectives: Vec<Objective>,
    shown: Vec<bool>,
    store: SaveStore,
    surface: Option<Box<dyn ObjectiveSurface>>,
    mounted: bool,
    subscriptions: Vec<SubscriptionId>,
}

impl ListInner {
    /// One pass over every objective. A failing condition leaves that
    /// objective hidden; the first failure is reported once the pass ends.
    /// Effects of newly completed objectives are handed back in list order.
    fn evaluate(&mut self) -> Pass {
        let state = self.store.snapshot();
        let mut first_error = None;
        let mut effects = Vec::new();

        let rows = self.objectives.iter_mut().zip(self.shown.iter_mut());
        for (index, (objective, shown)) in rows.enumerate() {
            let outcome = match objective.update_completed(&state) {
                Ok(newly_completed) => {
                    if newly_completed {
                        effects.extend(objective.take_exec().map(|exec| (index, exec)));
                    }
                    objective.should_show(&state)
                }
                Err(err) => Err(err),
            };
            *shown = match outcome {
                Ok(visible) => visible,
                Err(err) => {
                    first_error.get_or_insert(err);
                    false
                }
            };
        }

        if self.surface.is_some() {
            self.draw(&state);
        }
        Pass {
            result: first_error.map_or(Ok(()), Err),
            effects,
        }
    }

    fn entries(&self, state: &SaveState) -> Vec<ObjectiveEntry> {
        let mut entries: Vec<ObjectiveEntry> = self
            .objectives
            .iter()
            .zip(&self.shown)
            .filter(|(_, shown)| **shown)
            .map(|(objective, _)| ObjectiveEntry {
                id: objective.id(),
                name: objective.name.clone(),
                progress: objective.progress_text(state),
                definition: objective.definition.clone(),
                completed: objective.is_completed(),
                priority: objective.priority,
            })
            .collect();
        entries.sort_by_key(|entry| Reverse(entry.priority));
        entries
    }

    fn draw(&mut self, state: &SaveState) {
        let entries = self.entries(state);
        if let Some(surface) = self.surface.as_mut() {
            surface.render(&entries);
            self.mounted = true;
        }
    }

    fn teardown(&mut self) {
        let bus = self.store.bus().clone();
        for id in self.subscriptions.drain(..) {
            bus.unsubscribe(id);
        }
        if let Some(mut surface) = self.surface.take() {
            if self.mounted {
                surface.detach();
            }
        }
        self.mounted = false;
    }
}

struct ListShared {
    state: RefCell<ListInner>,
    /// A pass or its effects are running.
    busy: Cell<bool>,
    /// A change arrived while the list was mid-evaluation.
    rerun: Cell<bool>,
    /// Teardown was requested while the list was mid-evaluation.
    cleanup_requested: Cell<bool>,
}

impl Drop for ListShared {
    fn drop(&mut self) {
        self.state.get_mut().teardown();
    }
}

/// Owns a set of objectives and keeps them current with the save.
///
/// Cloning yields another handle to the same list.
#[derive(Clone)]
pub struct ObjectiveList {
    shared: Rc<ListShared>,
}

impl ObjectiveList {
    /// Take ownership of `objectives`, start listening for state changes,
    /// then evaluate once. With a surface, the visible entries are
    /// rendered on every evaluation.
    pub fn new(
        objectives: Vec<Objective>,
        store: SaveStore,
        surface: Option<Box<dyn ObjectiveSurface>>,
    ) -> Result<Self, ObjectiveError> {
        let shown = vec![false; objectives.len()];
        let bus = store.bus().clone();
        let list = Self {
            shared: Rc::new(ListShared {
                state: RefCell::new(ListInner {
                    objectives,
                    shown,
                    store,
                    surface,
                    mounted: false,
                    subscriptions: Vec::new(),
                }),
                busy: Cell::new(false),
                rerun: Cell::new(false),
                cleanup_requested: Cell::new(false),
            }),
        };

        let weak = Rc::downgrade(&list.shared);
        let on_change = bus.subscribe(Signal::StateChanged, move || {
            if let Some(list) = Self::upgrade(&weak) {
                if let Err(err) = list.change_tracker() {
                    error!(error = %err, "objective list update failed");
                }
            }
        });
        let weak = Rc::downgrade(&list.shared);
        let on_leave = bus.subscribe(Signal::PageLeaving, move || {
            if let Some(list) = Self::upgrade(&weak) {
                list.cleanup();
            }
        });
        list.shared
            .state
            .borrow_mut()
            .subscriptions
            .extend([on_change, on_leave]);

        if let Err(err) = list.change_tracker() {
            list.cleanup();
            return Err(err);
        }

        debug!(objectives = list.len(), "objective list created");
        Ok(list)
    }

    fn upgrade(weak: &Weak<ListShared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    /// Re-check every objective in order, then re-render if a surface is
    /// attached. Effects run after the pass, in list order, and may query
    /// or mutate through this list. A call made from inside an effect is
    /// folded into another pass once the current one finishes.
    pub fn change_tracker(&self) -> Result<(), ObjectiveError> {
        if self.shared.busy.replace(true) {
            self.shared.rerun.set(true);
            return Ok(());
        }
        let result = self.run_passes();
        self.shared.busy.set(false);

        if self.shared.cleanup_requested.take() {
            self.cleanup();
        }
        result
    }

    fn run_passes(&self) -> Result<(), ObjectiveError> {
        loop {
            self.shared.rerun.set(false);
            let Ok(mut inner) = self.shared.state.try_borrow_mut() else {
                debug!("objective list borrowed elsewhere, pass skipped");
                return Ok(());
            };
            let Pass {
                result,
                mut effects,
            } = inner.evaluate();
            drop(inner);

            for (_, exec) in effects.iter_mut() {
                exec();
            }
            if let Ok(mut inner) = self.shared.state.try_borrow_mut() {
                for (index, exec) in effects {
                    if let Some(objective) = inner.objectives.get_mut(index) {
                        objective.restore_exec(exec);
                    }
                }
            }

            if result.is_err() || !self.shared.rerun.get() {
                return result;
            }
        }
    }

    /// Render the currently visible objectives without re-evaluating.
    pub fn render(&self) {
        let Ok(mut inner) = self.shared.state.try_borrow_mut() else {
            return;
        };
        let state = inner.store.snapshot();
        inner.draw(&state);
    }

    /// True iff every objective is complete. Vacuously true when empty.
    pub fn is_list_completed(&self) -> bool {
        self.shared
            .state
            .borrow()
            .objectives
            .iter()
            .all(Objective::is_completed)
    }

    /// Stop listening and detach the surface. Safe to call repeatedly,
    /// before anything was rendered, or from inside a signal listener.
    pub fn cleanup(&self) {
        if self.shared.busy.get() {
            self.shared.cleanup_requested.set(true);
            return;
        }
        match self.shared.state.try_borrow_mut() {
            Ok(mut inner) => inner.teardown(),
            Err(_) => self.shared.cleanup_requested.set(true),
        }
    }

    /// Whether the list still listens for state changes.
    pub fn is_active(&self) -> bool {
        !self.shared.state.borrow().subscriptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shared.state.borrow().objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completion and visibility of each objective, in list order.
    pub fn statuses(&self) -> Vec<ObjectiveStatus> {
        let inner = self.shared.state.borrow();
        inner
            .objectives
            .iter()
            .zip(&inner.shown)
            .map(|(objective, shown)| ObjectiveStatus {
                id: objective.id(),
                name: objective.name.clone(),
                completed: objective.is_completed(),
                shown: *shown,
            })
            .collect()
    }
}

impl std::fmt::Debug for ObjectiveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shared.state.try_borrow() {
            Ok(inner) => f
                .debug_struct("ObjectiveList")
                .field("objectives", &inner.objectives)
                .field("mounted", &inner.mounted)
                .field("active", &!inner.subscriptions.is_empty())
                .finish(),
            Err(_) => f.write_str("ObjectiveList { .. }"),
        }
    }
}
