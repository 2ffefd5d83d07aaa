//! Save store - the shared handle every mutation goes through.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

use crate::save::SaveState;
use crate::signals::{Signal, SignalBus};

/// Shared save plus the bus its changes are announced on.
///
/// Cloning yields another handle to the same save.
#[derive(Debug, Clone)]
pub struct SaveStore {
    save: Rc<RefCell<SaveState>>,
    bus: SignalBus,
}

impl SaveStore {
    /// Wrap a save and announce its changes on `bus`.
    pub fn new(save: SaveState, bus: SignalBus) -> Self {
        Self {
            save: Rc::new(RefCell::new(save)),
            bus,
        }
    }

    /// The bus this store dispatches on.
    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    /// Read from the save without copying it.
    ///
    /// The closure must not call back into [`SaveStore::update`].
    pub fn read<R>(&self, f: impl FnOnce(&SaveState) -> R) -> R {
        f(&self.save.borrow())
    }

    /// Copy of the save, for evaluation that may trigger further mutation.
    pub fn snapshot(&self) -> SaveState {
        self.save.borrow().clone()
    }

    /// Path of the page currently displayed.
    pub fn current_path(&self) -> Option<String> {
        self.save.borrow().current_path.clone()
    }

    /// Whether `path` has been visited.
    pub fn has_explored(&self, path: &str) -> bool {
        self.save.borrow().explored.contains(path)
    }

    /// Mutate the save, then fire [`Signal::StateChanged`].
    pub fn update<R>(&self, f: impl FnOnce(&mut SaveState) -> R) -> R {
        let result = f(&mut self.save.borrow_mut());
        self.bus.dispatch(Signal::StateChanged);
        result
    }

    /// Display a new page: mark it explored and current, then fire
    /// [`Signal::StateChanged`] followed by [`Signal::PageEntered`].
    pub fn enter_page(&self, path: impl Into<String>) {
        let path = path.into();
        info!(path = %path, "page_entered");
        {
            let mut save = self.save.borrow_mut();
            save.mark_explored(path.clone());
            save.current_path = Some(path);
        }
        self.bus.dispatch(Signal::StateChanged);
        self.bus.dispatch(Signal::PageEntered);
    }

    /// Announce that the current page is being torn down.
    pub fn leave_page(&self) {
        info!(path = ?self.current_path(), "page_leaving");
        self.bus.dispatch(Signal::PageLeaving);
    }
}
