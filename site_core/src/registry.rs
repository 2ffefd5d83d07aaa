//! Buddy registry - the global and per-page buddy collections.
//!
//! Global buddies are defined once and re-placed on every page load. Page
//! buddies live until the page is left. The registry is an ordinary value;
//! [`BuddyRegistry::attach`] wires it to the page signals.

use site_state::{Signal, SignalBus, SubscriptionId};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

use crate::buddy::{Buddy, RemoveOptions};
use crate::error::BuddyError;

/// Owns every registered buddy.
#[derive(Debug, Default)]
pub struct BuddyRegistry {
    global_buddies: Vec<Buddy>,
    current_page_buddies: Vec<Buddy>,
    bus: Option<SignalBus>,
    subscriptions: Vec<SubscriptionId>,
}

impl BuddyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_buddies(&self) -> &[Buddy] {
        &self.global_buddies
    }

    pub fn current_page_buddies(&self) -> &[Buddy] {
        &self.current_page_buddies
    }

    fn contains(&self, buddy: &Buddy) -> bool {
        let key = buddy.key();
        self.global_buddies
            .iter()
            .chain(&self.current_page_buddies)
            .any(|known| known.key() == key)
    }

    /// Track a buddy. Global buddies wait for the next page load; page
    /// buddies are rendered straight away if they belong on this page.
    pub fn register(&mut self, buddy: Buddy) -> Result<(), BuddyError> {
        if self.contains(&buddy) {
            warn!(buddy = %buddy.id(), "buddy registered twice");
            return Err(BuddyError::AlreadyRegistered { id: buddy.id() });
        }

        if buddy.is_global() {
            debug!(buddy = %buddy.id(), "global buddy registered");
            self.global_buddies.push(buddy);
            return Ok(());
        }

        self.current_page_buddies.push(buddy.clone());
        if buddy.should_be_on_page() {
            buddy.render()?;
        }
        Ok(())
    }

    /// Place each global buddy that newly belongs on the current page.
    ///
    /// Buddies already rendered and still eligible are left alone. Returns
    /// how many were rendered. A failing render does not stop the rest;
    /// the first failure is returned afterwards.
    pub fn render_global_buddies(&self) -> Result<usize, BuddyError> {
        let mut rendered = 0;
        let mut first_error = None;

        for buddy in &self.global_buddies {
            if buddy.is_rendered() {
                if buddy.should_be_on_page() {
                    continue;
                }
                buddy.remove(RemoveOptions::new(true, false));
            }

            buddy.set_new_location(None);
            if !buddy.should_be_on_page() {
                continue;
            }
            match buddy.render() {
                Ok(()) => rendered += 1,
                Err(err) => {
                    warn!(buddy = %buddy.id(), error = %err, "global buddy failed to render");
                    first_error.get_or_insert(err);
                }
            }
        }

        first_error.map_or(Ok(rendered), Err)
    }

    /// Fire `page_enter` on every rendered buddy that has not seen this page.
    pub fn trigger_page_buddies(&self) -> usize {
        self.global_buddies
            .iter()
            .chain(&self.current_page_buddies)
            .filter(|buddy| buddy.enter_page())
            .count()
    }

    /// Remove every buddy and forget the page buddies. Global buddies stay
    /// tracked for the next page.
    pub fn clean_page_buddies(&mut self, options: RemoveOptions) {
        for buddy in self.global_buddies.iter().chain(&self.current_page_buddies) {
            buddy.remove(options);
        }
        info!(
            page_buddies = self.current_page_buddies.len(),
            global_buddies = self.global_buddies.len(),
            "page_buddies_cleaned"
        );
        self.current_page_buddies.clear();
    }

    /// A page finished loading.
    pub fn on_page_load(&self) -> Result<(), BuddyError> {
        let rendered = self.render_global_buddies();
        self.trigger_page_buddies();
        rendered.map(|_| ())
    }

    /// The page is about to go away.
    pub fn on_page_leave(&mut self) {
        self.clean_page_buddies(RemoveOptions::new(true, true));
    }

    /// Save state changed; re-check pause conditions.
    pub fn on_state_changed(&self) {
        for buddy in self.global_buddies.iter().chain(&self.current_page_buddies) {
            buddy.sync_pause();
        }
    }

    /// Subscribe `this` to the page and state signals on `bus`, replacing
    /// any earlier attachment.
    pub fn attach(this: &Rc<RefCell<Self>>, bus: &SignalBus) {
        this.borrow_mut().detach();

        let on_load = Self::listen(this, bus, Signal::PageEntered, |registry| {
            if let Err(err) = registry.on_page_load() {
                warn!(error = %err, "page load left some buddies unrendered");
            }
        });
        let on_leave = Self::listen(this, bus, Signal::PageLeaving, Self::on_page_leave);
        let on_change = Self::listen(this, bus, Signal::StateChanged, |registry| {
            registry.on_state_changed()
        });

        let mut registry = this.borrow_mut();
        registry.bus = Some(bus.clone());
        registry.subscriptions = vec![on_load, on_leave, on_change];
    }

    fn listen(
        this: &Rc<RefCell<Self>>,
        bus: &SignalBus,
        signal: Signal,
        handler: impl Fn(&mut Self) + 'static,
    ) -> SubscriptionId {
        let weak: Weak<RefCell<Self>> = Rc::downgrade(this);
        bus.subscribe(signal, move || {
            let Some(registry) = weak.upgrade() else {
                return;
            };
            match registry.try_borrow_mut() {
                Ok(mut registry) => handler(&mut registry),
                Err(_) => warn!(?signal, "registry busy, signal ignored"),
            };
        })
    }

    /// Stop listening to signals. Tracked buddies are kept.
    pub fn detach(&mut self) {
        if let Some(bus) = self.bus.take() {
            for id in self.subscriptions.drain(..) {
                bus.unsubscribe(id);
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.bus.is_some()
    }
}

impl Drop for BuddyRegistry {
    fn drop(&mut self) {
        self.detach();
    }
}
