//! Timers - the host event loop's clock, and per-owner tracking so an
//! owner can cancel everything it scheduled in one call.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Handle to a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

type Callback = Box<dyn FnMut()>;

struct Entry {
    due: u64,
    every: Option<u64>,
    /// `None` while the callback is running.
    callback: Option<Callback>,
}

#[derive(Default)]
struct SchedulerInner {
    now: u64,
    next_id: u64,
    entries: BTreeMap<TimerHandle, Entry>,
}

/// Millisecond clock with one-shot and repeating timers.
///
/// Time only moves when the host calls [`Scheduler::advance`], so tests run
/// deterministically. Cloning yields another handle to the same clock.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in milliseconds since the scheduler was created.
    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Run `callback` once, `delay_ms` from now.
    pub fn set_timeout(&self, delay_ms: u64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.insert(delay_ms, None, Box::new(callback))
    }

    /// Run `callback` every `every_ms`, starting `every_ms` from now.
    pub fn set_interval(&self, every_ms: u64, callback: impl FnMut() + 'static) -> TimerHandle {
        let every = every_ms.max(1);
        self.insert(every, Some(every), Box::new(callback))
    }

    fn insert(&self, delay_ms: u64, every: Option<u64>, callback: Callback) -> TimerHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let handle = TimerHandle(inner.next_id);
        let due = inner.now + delay_ms;
        inner.entries.insert(
            handle,
            Entry {
                due,
                every,
                callback: Some(callback),
            },
        );
        handle
    }

    /// Cancel a timer. It will not run again, even if already due.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        // Dropped after the borrow is released.
        let removed = self.inner.borrow_mut().entries.remove(&handle);
        removed.is_some()
    }

    /// Whether a timer is still scheduled.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.inner.borrow().entries.contains_key(&handle)
    }

    /// Number of scheduled timers.
    pub fn pending(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Move the clock forward, firing every timer that comes due on the way.
    ///
    /// Timers fire in due-time order, ties broken by scheduling order.
    /// Returns the number of callbacks run.
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.now() + ms;
        let mut fired = 0;

        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let due = inner
                    .entries
                    .iter()
                    .filter(|(_, entry)| entry.due <= target && entry.callback.is_some())
                    .min_by_key(|(handle, entry)| (entry.due, **handle))
                    .map(|(handle, entry)| (*handle, entry.due));

                match due {
                    Some((handle, due)) => {
                        inner.now = inner.now.max(due);
                        inner
                            .entries
                            .get_mut(&handle)
                            .and_then(|entry| entry.callback.take())
                            .map(|callback| (handle, callback))
                    }
                    None => None,
                }
            };

            let Some((handle, mut callback)) = next else {
                break;
            };
            callback();
            fired += 1;

            let mut inner = self.inner.borrow_mut();
            let repeat = inner.entries.get(&handle).and_then(|entry| entry.every);
            match repeat {
                Some(every) => {
                    if let Some(entry) = inner.entries.get_mut(&handle) {
                        entry.due += every;
                        entry.callback = Some(callback);
                    }
                }
                None => {
                    inner.entries.remove(&handle);
                }
            }
        }

        let mut inner = self.inner.borrow_mut();
        inner.now = inner.now.max(target);
        fired
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.entries.len())
            .finish()
    }
}

/// The timers one owner has scheduled.
#[derive(Debug)]
pub struct TimerTracker {
    scheduler: Scheduler,
    timeouts: Vec<TimerHandle>,
    intervals: Vec<TimerHandle>,
}

impl TimerTracker {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            timeouts: Vec::new(),
            intervals: Vec::new(),
        }
    }

    /// Schedule a tracked one-shot callback.
    pub fn schedule(&mut self, delay_ms: u64, callback: impl FnMut() + 'static) -> TimerHandle {
        // Forget timeouts that already fired.
        let scheduler = &self.scheduler;
        self.timeouts.retain(|handle| scheduler.is_pending(*handle));

        let handle = self.scheduler.set_timeout(delay_ms, callback);
        self.timeouts.push(handle);
        handle
    }

    /// Schedule a tracked repeating callback.
    pub fn schedule_repeating(
        &mut self,
        every_ms: u64,
        callback: impl FnMut() + 'static,
    ) -> TimerHandle {
        let handle = self.scheduler.set_interval(every_ms, callback);
        self.intervals.push(handle);
        handle
    }

    /// Cancel one tracked timer.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.timeouts.retain(|h| *h != handle);
        self.intervals.retain(|h| *h != handle);
        self.scheduler.cancel(handle);
    }

    /// Cancel every tracked one-shot timer.
    pub fn clear_timeouts(&mut self) {
        for handle in std::mem::take(&mut self.timeouts) {
            self.scheduler.cancel(handle);
        }
    }

    /// Cancel every tracked repeating timer.
    pub fn clear_intervals(&mut self) {
        for handle in std::mem::take(&mut self.intervals) {
            self.scheduler.cancel(handle);
        }
    }

    /// Cancel everything this owner scheduled.
    pub fn cancel_all(&mut self) {
        self.clear_timeouts();
        self.clear_intervals();
    }

    /// Tracked timers that are still scheduled.
    pub fn active_count(&self) -> usize {
        self.timeouts
            .iter()
            .chain(self.intervals.iter())
            .filter(|handle| self.scheduler.is_pending(**handle))
            .count()
    }
}
