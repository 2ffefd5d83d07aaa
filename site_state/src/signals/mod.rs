//! Change signals - synchronous, payload-free notifications.
//!
//! Listeners run in registration order before `dispatch` returns. A signal
//! dispatched again from inside one of its own listeners is deferred and
//! delivered once the current round finishes.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

/// The signals the engines react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Save or game state was mutated.
    StateChanged,
    /// A page finished loading.
    PageEntered,
    /// The current page is about to be torn down.
    PageLeaving,
}

/// Handle returned by [`SignalBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn()>;

struct Subscription {
    id: SubscriptionId,
    signal: Signal,
    listener: Listener,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscriptions: Vec<Subscription>,
    dispatching: HashSet<Signal>,
    deferred: HashSet<Signal>,
}

/// Shared signal bus. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct SignalBus {
    inner: Rc<RefCell<BusInner>>,
}

impl SignalBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one signal.
    pub fn subscribe(&self, signal: Signal, listener: impl Fn() + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscriptions.push(Subscription {
            id,
            signal,
            listener: Rc::new(listener),
        });
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    ///
    /// Safe to call from inside any listener, including the one being removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner
                .subscriptions
                .iter()
                .position(|s| s.id == id)
                .map(|idx| inner.subscriptions.remove(idx))
        };
        removed.is_some()
    }

    /// Whether a subscription is still registered.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.borrow().subscriptions.iter().any(|s| s.id == id)
    }

    /// Number of listeners registered for a signal.
    pub fn listener_count(&self, signal: Signal) -> usize {
        self.inner
            .borrow()
            .subscriptions
            .iter()
            .filter(|s| s.signal == signal)
            .count()
    }

    /// Notify every listener of `signal`.
    ///
    /// Returns how many listener invocations ran, deferred rounds included.
    /// A nested dispatch of the same signal returns 0 and is replayed later.
    pub fn dispatch(&self, signal: Signal) -> usize {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.dispatching.contains(&signal) {
                debug!(?signal, "dispatch deferred until current round completes");
                inner.deferred.insert(signal);
                return 0;
            }
            inner.dispatching.insert(signal);
        }

        let mut notified = 0;
        loop {
            let round: Vec<(SubscriptionId, Listener)> = self
                .inner
                .borrow()
                .subscriptions
                .iter()
                .filter(|s| s.signal == signal)
                .map(|s| (s.id, s.listener.clone()))
                .collect();

            for (id, listener) in round {
                // Skip listeners removed earlier in this round.
                if self.is_subscribed(id) {
                    listener();
                    notified += 1;
                }
            }

            let mut inner = self.inner.borrow_mut();
            if !inner.deferred.remove(&signal) {
                inner.dispatching.remove(&signal);
                break;
            }
        }
        notified
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SignalBus")
            .field("subscriptions", &inner.subscriptions.len())
            .field("dispatching", &inner.dispatching)
            .finish()
    }
}
