//! In-memory event target.
//!
//! [`ListenerRegistry`] keeps listeners per event type the way a DOM node
//! does: identical registrations are deduplicated, removal matches on
//! handler identity plus the capture flag, and listeners run in
//! registration order.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::target::{EventTarget, Handler, RegistrationOptions};

/// Event propagation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventPhase {
    /// No event is being processed.
    None = 0,
    /// Event is travelling from the root towards the target.
    Capturing = 1,
    /// Event has arrived at the target.
    AtTarget = 2,
    /// Event is travelling back up from the target.
    Bubbling = 3,
}

struct RegisteredListener<E> {
    event_type: String,
    handler: Handler<E>,
    options: RegistrationOptions,
    removed: Cell<bool>,
}

impl<E> RegisteredListener<E> {
    fn matches(&self, event_type: &str, handler: &Handler<E>, capture: bool) -> bool {
        self.event_type == event_type
            && self.options.capture == capture
            && Rc::ptr_eq(&self.handler, handler)
    }

    fn fires_in(&self, phase: EventPhase) -> bool {
        match phase {
            EventPhase::Capturing => self.options.capture,
            EventPhase::AtTarget => true,
            EventPhase::Bubbling => !self.options.capture,
            EventPhase::None => false,
        }
    }
}

/// Listener storage for one dispatch target.
pub struct ListenerRegistry<E> {
    listeners: RefCell<Vec<Rc<RegisteredListener<E>>>>,
}

impl<E> ListenerRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Add a listener. Re-adding the same handler with the same type and
    /// capture flag is ignored.
    pub fn add(&self, event_type: &str, handler: Handler<E>, options: RegistrationOptions) {
        let mut listeners = self.listeners.borrow_mut();
        if listeners
            .iter()
            .any(|l| l.matches(event_type, &handler, options.capture))
        {
            trace!(event_type, "Duplicate listener ignored");
            return;
        }
        listeners.push(Rc::new(RegisteredListener {
            event_type: event_type.to_string(),
            handler,
            options,
            removed: Cell::new(false),
        }));
    }

    /// Remove a listener. Returns whether anything was removed.
    pub fn remove(&self, event_type: &str, handler: &Handler<E>, capture: bool) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners
            .iter()
            .position(|l| l.matches(event_type, handler, capture))
        {
            Some(index) => {
                listeners.remove(index).removed.set(true);
                true
            }
            None => false,
        }
    }

    /// Number of listeners registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event_type)
            .count()
    }

    /// Whether there are any listeners for `event_type`.
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.listener_count(event_type) > 0
    }

    /// Total listeners across all event types.
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Whether no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Invoke the listeners for `event_type` that fire in `phase`.
    ///
    /// The listener list is snapshotted first, so handlers may add or remove
    /// listeners. Listeners removed during dispatch are skipped; `once`
    /// listeners are removed before they run. Returns the number invoked.
    pub fn invoke(&self, event_type: &str, event: &E, phase: EventPhase) -> usize {
        self.invoke_until(event_type, event, phase, || false)
    }

    /// Like [`ListenerRegistry::invoke`], but checks `stop` after each
    /// listener (stopImmediatePropagation).
    pub fn invoke_until(
        &self,
        event_type: &str,
        event: &E,
        phase: EventPhase,
        stop: impl Fn() -> bool,
    ) -> usize {
        let snapshot: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event_type && l.fires_in(phase))
            .cloned()
            .collect();

        let mut invoked = 0;
        for listener in snapshot {
            if listener.removed.get() {
                continue;
            }
            if listener.options.once {
                self.remove(event_type, &listener.handler, listener.options.capture);
            }
            (listener.handler)(event);
            invoked += 1;

            if stop() {
                break;
            }
        }
        invoked
    }
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventTarget<E> for ListenerRegistry<E> {
    fn add_event_listener(&self, event_type: &str, handler: Handler<E>, options: RegistrationOptions) {
        self.add(event_type, handler, options);
    }

    fn remove_event_listener(&self, event_type: &str, handler: &Handler<E>, capture: bool) {
        self.remove(event_type, handler, capture);
    }
}

impl<E> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_count", &self.len())
            .finish()
    }
}
