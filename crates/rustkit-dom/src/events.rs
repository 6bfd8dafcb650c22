//! # DOM Events
//!
//! Event objects and capture/target/bubble dispatch through the window and
//! the node tree. Listener storage lives in
//! [`rustkit_listener::ListenerRegistry`]; this module only decides which
//! registries run, in which phase, and when propagation stops.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustkit_listener::EventPhase;
use tracing::trace;

use crate::{Node, NodeId, Window};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

impl EventId {
    /// Create a new unique EventId.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an event currently is, or where it was aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTarget {
    Window,
    Node(NodeId),
}

/// Type-specific event payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventDetail {
    #[default]
    None,
    Mouse(MouseEventData),
    Keyboard(KeyboardEventData),
    Input(InputEventData),
}

/// Mouse event data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseEventData {
    /// X coordinate relative to the viewport.
    pub client_x: f64,
    /// Y coordinate relative to the viewport.
    pub client_y: f64,
    /// Which mouse button triggered the event.
    pub button: i16,
    pub ctrl_key: bool,
    pub shift_key: bool,
}

/// Keyboard event data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardEventData {
    /// The key value.
    pub key: String,
    /// The physical key code.
    pub code: String,
    /// Whether this is an auto-repeat.
    pub repeat: bool,
}

/// Input event data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputEventData {
    /// The characters entered, if any.
    pub data: Option<String>,
}

/// A DOM event.
///
/// Dispatch state lives in cells so listeners, which only get `&DomEvent`,
/// can stop propagation or prevent the default action. Cloning (for
/// delayed or debounced listeners) snapshots that state.
#[derive(Debug, Clone)]
pub struct DomEvent {
    /// Unique ID for this event.
    pub id: EventId,
    /// Event type (e.g., "click", "keydown").
    pub event_type: String,
    /// Whether the event bubbles.
    pub bubbles: bool,
    /// Whether `prevent_default` has any effect.
    pub cancelable: bool,
    /// Type-specific payload.
    pub detail: EventDetail,
    phase: Cell<EventPhase>,
    target: Cell<Option<DispatchTarget>>,
    current_target: Cell<Option<DispatchTarget>>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl DomEvent {
    /// Create a new event without payload.
    pub fn new(event_type: &str, bubbles: bool, cancelable: bool) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.to_string(),
            bubbles,
            cancelable,
            detail: EventDetail::None,
            phase: Cell::new(EventPhase::None),
            target: Cell::new(None),
            current_target: Cell::new(None),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    /// A bubbling, cancelable mouse event.
    pub fn mouse(event_type: &str, data: MouseEventData) -> Self {
        Self::new(event_type, true, true).with_detail(EventDetail::Mouse(data))
    }

    /// A bubbling, cancelable `click`.
    pub fn click() -> Self {
        Self::mouse("click", MouseEventData::default())
    }

    /// A bubbling, cancelable keyboard event.
    pub fn keyboard(event_type: &str, data: KeyboardEventData) -> Self {
        Self::new(event_type, true, true).with_detail(EventDetail::Keyboard(data))
    }

    /// A bubbling, non-cancelable `input`.
    pub fn input(data: InputEventData) -> Self {
        Self::new("input", true, false).with_detail(EventDetail::Input(data))
    }

    /// Attach a payload.
    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Get the current phase.
    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    /// Where the event was dispatched.
    pub fn target(&self) -> Option<DispatchTarget> {
        self.target.get()
    }

    /// Whose listeners are running right now.
    pub fn current_target(&self) -> Option<DispatchTarget> {
        self.current_target.get()
    }

    /// Stop propagation after the current target's listeners.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    /// Stop propagation, including remaining listeners on the current target.
    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }

    /// Prevent the default action.
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// One stop on the propagation path.
enum PathEntry<'a> {
    Window(&'a Window),
    Node(&'a Rc<Node>),
}

impl PathEntry<'_> {
    fn dispatch_target(&self) -> DispatchTarget {
        match self {
            PathEntry::Window(_) => DispatchTarget::Window,
            PathEntry::Node(node) => DispatchTarget::Node(node.id),
        }
    }

    fn invoke(&self, event: &DomEvent, phase: EventPhase) -> usize {
        event.current_target.set(Some(self.dispatch_target()));
        let stop = || event.immediate_propagation_stopped();
        match self {
            PathEntry::Window(window) => {
                window
                    .event_target
                    .invoke_until(&event.event_type, event, phase, stop)
            }
            PathEntry::Node(node) => {
                node.event_target
                    .invoke_until(&event.event_type, event, phase, stop)
            }
        }
    }
}

/// Event dispatcher for propagating events through the DOM tree.
pub struct EventDispatcher;

impl EventDispatcher {
    /// Dispatch `event` at `target`.
    ///
    /// The path is the window (if any), then the node's ancestors from the
    /// root down, then the node itself. Returns true if the default action
    /// was not prevented.
    pub fn dispatch(event: &DomEvent, target: &Rc<Node>, window: Option<&Window>) -> bool {
        let ancestors = target.ancestors();

        let mut path: Vec<PathEntry<'_>> = Vec::with_capacity(ancestors.len() + 2);
        if let Some(window) = window {
            path.push(PathEntry::Window(window));
        }
        path.extend(ancestors.iter().rev().map(PathEntry::Node));
        path.push(PathEntry::Node(target));

        event.target.set(Some(DispatchTarget::Node(target.id)));
        Self::run_path(event, &path)
    }

    /// Dispatch `event` at the window itself.
    pub fn dispatch_to_window(event: &DomEvent, window: &Window) -> bool {
        event.target.set(Some(DispatchTarget::Window));
        Self::run_path(event, &[PathEntry::Window(window)])
    }

    fn run_path(event: &DomEvent, path: &[PathEntry<'_>]) -> bool {
        let Some((at_target, parents)) = path.split_last() else {
            return true;
        };
        let mut invoked = 0;

        event.phase.set(EventPhase::Capturing);
        for entry in parents {
            if event.propagation_stopped() {
                break;
            }
            invoked += entry.invoke(event, EventPhase::Capturing);
        }

        if !event.propagation_stopped() {
            event.phase.set(EventPhase::AtTarget);
            invoked += at_target.invoke(event, EventPhase::AtTarget);
        }

        if event.bubbles {
            event.phase.set(EventPhase::Bubbling);
            for entry in parents.iter().rev() {
                if event.propagation_stopped() {
                    break;
                }
                invoked += entry.invoke(event, EventPhase::Bubbling);
            }
        }

        trace!(event_type = %event.event_type, invoked, "Event dispatched");

        event.phase.set(EventPhase::None);
        event.current_target.set(None);

        !event.default_prevented()
    }
}
