//! Timer queues (setTimeout/clearTimeout equivalents).
//!
//! [`VirtualTimers`] runs on a manual clock and is what tests and headless
//! hosts use. [`TokioTimers`] schedules onto the current tokio `LocalSet`.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::trace;

/// Unique identifier for a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Create a new unique TimerId.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot timer callback.
pub type TimerCallback = Box<dyn FnOnce() + 'static>;

/// A single-threaded one-shot timer primitive.
pub trait TimerQueue {
    /// Run `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Cancel a timer. Unknown or already-fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);
}

/// Deterministic timers driven by [`VirtualTimers::advance`].
///
/// Timers fire in due order; ties fire in scheduling order. A timer
/// scheduled from inside a callback fires during the same `advance` if it
/// falls due before the advance target.
#[derive(Default)]
pub struct VirtualTimers {
    now: Cell<Duration>,
    queue: RefCell<BTreeMap<(Duration, TimerId), TimerCallback>>,
}

impl VirtualTimers {
    /// Create a queue with its clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Move the clock forward by `by`, firing every timer that falls due.
    /// Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let until = self.now.get() + by;
        let mut fired = 0;

        loop {
            // Release the borrow before running the callback so it can
            // schedule or cancel timers.
            let next = {
                let mut queue = self.queue.borrow_mut();
                let is_due = queue
                    .first_key_value()
                    .is_some_and(|(&(due, _), _)| due <= until);
                if is_due {
                    queue.pop_first()
                } else {
                    None
                }
            };

            let Some(((due, id), callback)) = next else {
                break;
            };

            self.now.set(due);
            trace!(?id, ?due, "Virtual timer fired");
            callback();
            fired += 1;
        }

        self.now.set(until);
        fired
    }

    /// Fire everything that is queued, however far away.
    pub fn run_all(&self) -> usize {
        let last_due = self.queue.borrow().keys().next_back().map(|&(due, _)| due);
        match last_due {
            Some(due) => self.advance(due.saturating_sub(self.now.get())),
            None => 0,
        }
    }
}

impl TimerQueue for VirtualTimers {
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId::new();
        let due = self.now.get() + delay;
        self.queue.borrow_mut().insert((due, id), callback);
        trace!(?id, ?delay, "Virtual timer scheduled");
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        let mut queue = self.queue.borrow_mut();
        let before = queue.len();
        queue.retain(|&(_, queued), _| queued != id);
        if queue.len() != before {
            trace!(?id, "Virtual timer cancelled");
        }
    }
}

impl fmt::Debug for VirtualTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTimers")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Timers spawned onto the current tokio `LocalSet`.
///
/// # Panics
///
/// [`TimerQueue::set_timeout`] panics when called outside a `LocalSet`,
/// like `tokio::task::spawn_local`.
#[derive(Default)]
pub struct TokioTimers {
    handles: Rc<RefCell<HashMap<TimerId, AbortHandle>>>,
}

impl TokioTimers {
    /// Create an empty timer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.handles.borrow().len()
    }
}

impl TimerQueue for TokioTimers {
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId::new();
        let handles = Rc::clone(&self.handles);

        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            handles.borrow_mut().remove(&id);
            trace!(?id, "Timer fired");
            callback();
        });

        self.handles.borrow_mut().insert(id, task.abort_handle());
        trace!(?id, ?delay, "Timer scheduled");
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(handle) = self.handles.borrow_mut().remove(&id) {
            handle.abort();
            trace!(?id, "Timer cancelled");
        }
    }
}

impl fmt::Debug for TokioTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioTimers")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> TimerCallback) {
        let count = Rc::new(Cell::new(0));
        let handle = count.clone();
        let make = move || -> TimerCallback {
            let count = handle.clone();
            Box::new(move || count.set(count.get() + 1))
        };
        (count, make)
    }

    #[test]
    fn test_timer_id_uniqueness() {
        let id1 = TimerId::new();
        let id2 = TimerId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn test_virtual_timer_fires_when_due() {
        let timers = VirtualTimers::new();
        let (count, make) = counter();

        timers.set_timeout(Duration::from_millis(500), make());
        assert_eq!(timers.advance(Duration::from_millis(499)), 0);
        assert_eq!(count.get(), 0);

        assert_eq!(timers.advance(Duration::from_millis(1)), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(timers.now(), Duration::from_millis(500));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_virtual_timer_cancel() {
        let timers = VirtualTimers::new();
        let (count, make) = counter();

        let id = timers.set_timeout(Duration::from_millis(10), make());
        timers.clear_timeout(id);
        // Clearing twice is harmless.
        timers.clear_timeout(id);

        timers.advance(Duration::from_secs(1));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_virtual_timers_fire_in_due_order() {
        let timers = VirtualTimers::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, ms) in [("late", 30), ("early", 10), ("tie-a", 20), ("tie-b", 20)] {
            let order = order.clone();
            timers.set_timeout(
                Duration::from_millis(ms),
                Box::new(move || order.borrow_mut().push(label)),
            );
        }

        timers.advance(Duration::from_millis(30));
        assert_eq!(*order.borrow(), vec!["early", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn test_nested_timer_fires_in_same_advance() {
        let timers = Rc::new(VirtualTimers::new());
        let fired_at = Rc::new(Cell::new(None));

        let inner_timers = timers.clone();
        let inner_fired = fired_at.clone();
        timers.set_timeout(
            Duration::from_millis(10),
            Box::new(move || {
                let clock = inner_timers.clone();
                inner_timers.set_timeout(
                    Duration::from_millis(5),
                    Box::new(move || inner_fired.set(Some(clock.now()))),
                );
            }),
        );

        assert_eq!(timers.advance(Duration::from_millis(20)), 2);
        assert_eq!(fired_at.get(), Some(Duration::from_millis(15)));
    }

    #[test]
    fn test_run_all() {
        let timers = VirtualTimers::new();
        let (count, make) = counter();
        timers.set_timeout(Duration::from_secs(3), make());
        timers.set_timeout(Duration::from_secs(1), make());

        assert_eq!(timers.run_all(), 2);
        assert_eq!(count.get(), 2);
        assert_eq!(timers.now(), Duration::from_secs(3));
        assert_eq!(timers.run_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_after_delay() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let timers = TokioTimers::new();
                let (count, make) = counter();

                timers.set_timeout(Duration::from_millis(300), make());
                assert_eq!(timers.pending(), 1);

                tokio::time::sleep(Duration::from_millis(299)).await;
                assert_eq!(count.get(), 0);

                tokio::time::sleep(Duration::from_millis(2)).await;
                assert_eq!(count.get(), 1);
                assert_eq!(timers.pending(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let timers = TokioTimers::new();
                let (count, make) = counter();

                let id = timers.set_timeout(Duration::from_millis(50), make());
                timers.clear_timeout(id);
                assert_eq!(timers.pending(), 0);

                tokio::time::sleep(Duration::from_millis(100)).await;
                assert_eq!(count.get(), 0);
            })
            .await;
    }
}
