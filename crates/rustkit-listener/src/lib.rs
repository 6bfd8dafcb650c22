//! # RustKit Listener
//!
//! Declarative, leak-free event listener bindings.
//!
//! A [`ListenerHook`] attaches one callback to one or more dispatch targets
//! for one or more event types, optionally delayed, debounced, gated by an
//! `enabled` flag or limited to a single invocation, and guarantees that
//! every registration it made is removed again when its inputs change or it
//! is unmounted.
//!
//! ## Design Goals
//!
//! 1. **Symmetric teardown**: every attach is matched by exactly one detach
//! 2. **No orphaned timers**: teardown cancels pending delay/debounce timers
//! 3. **Stable handlers**: unchanged inputs never cause a re-bind
//! 4. **Host-agnostic**: targets, documents and timers are traits
//!
//! ## Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::time::Duration;
//! use rustkit_listener::{
//!     callback, Environment, EventPhase, ListenerHook, ListenerOptions, ListenerRegistry,
//!     TargetRef, TargetSpec, VirtualTimers,
//! };
//!
//! let timers = Rc::new(VirtualTimers::new());
//! let env = Environment::<u32>::new(timers.clone());
//!
//! let button = Rc::new(ListenerRegistry::<u32>::new());
//! let button_ref = TargetRef::<u32>::with_target(button.clone());
//!
//! let clicks = Rc::new(Cell::new(0));
//! let counter = clicks.clone();
//! let on_click = callback(move |_: &u32| counter.set(counter.get() + 1));
//!
//! let mut hook = ListenerHook::new(env);
//! let options = ListenerOptions::default().debounce(300);
//! hook.render(TargetSpec::Ref(button_ref), "click", on_click, &options);
//!
//! for _ in 0..5 {
//!     button.invoke("click", &1, EventPhase::AtTarget);
//! }
//! timers.advance(Duration::from_millis(300));
//! assert_eq!(clicks.get(), 1);
//!
//! drop(hook);
//! assert!(button.is_empty());
//! ```

pub mod binder;
pub mod env;
pub mod options;
pub mod registry;
pub mod target;
pub mod timers;
pub mod timing;

pub use binder::{attach_listener, Listener, ListenerHook, Teardown};
pub use env::{DocumentQuery, Environment};
pub use options::{EventTypes, ListenerOptions};
pub use registry::{EventPhase, ListenerRegistry};
pub use target::{EventTarget, Handler, RegistrationOptions, SharedTarget, TargetRef, TargetSpec};
pub use timers::{TimerCallback, TimerId, TimerQueue, TokioTimers, VirtualTimers};
pub use timing::{callback, Callback, DispatchMode, TimingPolicy};
