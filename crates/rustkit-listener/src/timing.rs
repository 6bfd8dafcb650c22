//! Timing policy: immediate, delayed or debounced dispatch, with an
//! optional fire-once guard.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::trace;

use crate::options::ListenerOptions;
use crate::target::Handler;
use crate::timers::{TimerId, TimerQueue};

/// The caller's event callback.
pub type Callback<E> = Rc<dyn Fn(&E)>;

/// Wrap a closure as a [`Callback`].
pub fn callback<E>(f: impl Fn(&E) + 'static) -> Callback<E> {
    Rc::new(f)
}

/// How an accepted event reaches the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Call synchronously.
    Immediate,
    /// One timer per event, no coalescing.
    Delay(Duration),
    /// Trailing-edge coalescing: only the last event in the window fires.
    Debounce(Duration),
}

/// Everything that shapes the wrapped handler besides the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPolicy {
    pub mode: DispatchMode,
    pub enabled: bool,
    pub once: bool,
}

impl TimingPolicy {
    /// Derive the policy from listener options. Delay is checked first.
    pub fn from_options(options: &ListenerOptions) -> Self {
        let mode = if let Some(delay) = options.delay_duration() {
            DispatchMode::Delay(delay)
        } else if let Some(window) = options.debounce_duration() {
            DispatchMode::Debounce(window)
        } else {
            DispatchMode::Immediate
        };

        Self {
            mode,
            enabled: options.enabled,
            once: options.once,
        }
    }
}

/// Timer and once-flag state owned by one hook instance.
pub(crate) struct TimingState {
    timers: Rc<dyn TimerQueue>,
    debounce: Cell<Option<TimerId>>,
    delayed: RefCell<Vec<TimerId>>,
    fired_once: Cell<bool>,
}

impl TimingState {
    pub(crate) fn new(timers: Rc<dyn TimerQueue>) -> Rc<Self> {
        Rc::new(Self {
            timers,
            debounce: Cell::new(None),
            delayed: RefCell::new(Vec::new()),
            fired_once: Cell::new(false),
        })
    }

    /// Timers that have been scheduled and have neither fired nor been
    /// cancelled.
    pub(crate) fn pending(&self) -> usize {
        usize::from(self.debounce.get().is_some()) + self.delayed.borrow().len()
    }

    #[cfg(test)]
    pub(crate) fn has_fired_once(&self) -> bool {
        self.fired_once.get()
    }

    /// Cancel every outstanding timer.
    pub(crate) fn cancel_pending(&self) {
        if let Some(id) = self.debounce.take() {
            self.timers.clear_timeout(id);
            trace!(?id, "Cancelled debounce timer");
        }

        let delayed = std::mem::take(&mut *self.delayed.borrow_mut());
        for id in delayed {
            self.timers.clear_timeout(id);
            trace!(?id, "Cancelled delay timer");
        }
    }

    fn schedule_delayed<E: 'static>(self: &Rc<Self>, delay: Duration, callback: Callback<E>, event: E) {
        let slot = Rc::new(Cell::new(None));
        let fired_slot = slot.clone();
        let owner = Rc::downgrade(self);

        let id = self.timers.set_timeout(
            delay,
            Box::new(move || {
                let Some(state) = owner.upgrade() else {
                    return;
                };
                if let Some(id) = fired_slot.get() {
                    state.delayed.borrow_mut().retain(|t| *t != id);
                }
                callback(&event);
            }),
        );

        slot.set(Some(id));
        self.delayed.borrow_mut().push(id);
        trace!(?id, ?delay, "Delayed dispatch scheduled");
    }

    fn schedule_debounced<E: 'static>(self: &Rc<Self>, window: Duration, callback: Callback<E>, event: E) {
        if let Some(previous) = self.debounce.take() {
            self.timers.clear_timeout(previous);
            trace!(id = ?previous, "Debounce timer superseded");
        }

        let owner: Weak<Self> = Rc::downgrade(self);
        let id = self.timers.set_timeout(
            window,
            Box::new(move || {
                let Some(state) = owner.upgrade() else {
                    return;
                };
                state.debounce.set(None);
                callback(&event);
            }),
        );

        self.debounce.set(Some(id));
        trace!(?id, ?window, "Debounced dispatch scheduled");
    }
}

impl fmt::Debug for TimingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingState")
            .field("debounce", &self.debounce.get())
            .field("delayed", &self.delayed.borrow().len())
            .field("fired_once", &self.fired_once.get())
            .finish_non_exhaustive()
    }
}

/// Build the handler that is actually registered on targets.
pub(crate) fn wrap_handler<E: Clone + 'static>(
    callback: Callback<E>,
    policy: TimingPolicy,
    state: &Rc<TimingState>,
) -> Handler<E> {
    let state = state.clone();

    Rc::new(move |event: &E| {
        if !policy.enabled {
            trace!("Listener disabled, event dropped");
            return;
        }

        if policy.once {
            if state.fired_once.replace(true) {
                trace!("Listener already fired once, event dropped");
                return;
            }
        } else {
            state.fired_once.set(false);
        }

        match policy.mode {
            DispatchMode::Immediate => callback(event),
            DispatchMode::Delay(delay) => state.schedule_delayed(delay, callback.clone(), event.clone()),
            DispatchMode::Debounce(window) => {
                state.schedule_debounced(window, callback.clone(), event.clone())
            }
        }
    })
}
