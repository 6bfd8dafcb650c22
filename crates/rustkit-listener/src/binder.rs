//! Lifecycle binder: attaches the wrapped handler, re-binds when inputs
//! change, and tears everything down on unmount.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::env::Environment;
use crate::options::{EventTypes, ListenerOptions};
use crate::target::{Handler, RegistrationOptions, SharedTarget, TargetSpec};
use crate::timing::{wrap_handler, Callback, TimingPolicy, TimingState};

/// Inputs whose change forces a re-bind.
struct EffectDeps<E: 'static> {
    target: TargetSpec<E>,
    event_types: EventTypes,
    handler: Handler<E>,
    enabled: bool,
    capture: bool,
    passive: bool,
    once: bool,
    target_selector: Option<String>,
}

impl<E: 'static> EffectDeps<E> {
    fn same_as(&self, other: &Self) -> bool {
        self.target.same_as(&other.target)
            && self.event_types == other.event_types
            && Rc::ptr_eq(&self.handler, &other.handler)
            && self.enabled == other.enabled
            && self.capture == other.capture
            && self.passive == other.passive
            && self.once == other.once
            && self.target_selector == other.target_selector
    }
}

/// One (target, event type) registration.
struct Attachment<E: 'static> {
    target: SharedTarget<E>,
    event_type: String,
}

/// The registrations made by the most recent effect run.
struct Binding<E: 'static> {
    deps: EffectDeps<E>,
    attached: Vec<Attachment<E>>,
}

impl<E: 'static> Binding<E> {
    fn detach(self) {
        for attachment in &self.attached {
            attachment.target.remove_event_listener(
                &attachment.event_type,
                &self.deps.handler,
                self.deps.capture,
            );
            trace!(event_type = %attachment.event_type, "Detached listener");
        }
        debug!(detached = self.attached.len(), "Listener unbound");
    }

    /// Drop pairs that were detached by a manual teardown so the automatic
    /// teardown does not detach them again.
    fn forget(&mut self, targets: &[SharedTarget<E>], event_types: &EventTypes) {
        self.attached.retain(|a| {
            !(event_types.contains(&a.event_type) && targets.iter().any(|t| Rc::ptr_eq(t, &a.target)))
        });
    }
}

struct MemoizedHandler<E: 'static> {
    callback: Callback<E>,
    policy: TimingPolicy,
    handler: Handler<E>,
}

/// Per-instance listener hook.
///
/// Call [`ListenerHook::render`] on every render of the owning component.
/// The wrapped handler is memoized on the callback's identity and the
/// timing policy; the binding re-runs only when one of its inputs changes.
/// Dropping the hook unmounts it.
pub struct ListenerHook<E: 'static> {
    env: Environment<E>,
    timing: Rc<TimingState>,
    memo: Option<MemoizedHandler<E>>,
    binding: Rc<RefCell<Option<Binding<E>>>>,
}

impl<E: Clone + 'static> ListenerHook<E> {
    /// Create an unmounted hook.
    pub fn new(env: Environment<E>) -> Self {
        let timing = TimingState::new(env.timers().clone());
        Self {
            env,
            timing,
            memo: None,
            binding: Rc::new(RefCell::new(None)),
        }
    }

    /// Run the hook for one render.
    ///
    /// Returns a manual teardown that detaches early; it is independent of
    /// the automatic teardown performed on re-bind and unmount.
    pub fn render(
        &mut self,
        target: TargetSpec<E>,
        event_types: impl Into<EventTypes>,
        callback: Callback<E>,
        options: &ListenerOptions,
    ) -> Teardown<E> {
        let handler = self.memoize(callback, TimingPolicy::from_options(options));
        let deps = EffectDeps {
            target,
            event_types: event_types.into(),
            handler,
            enabled: options.enabled,
            capture: options.capture,
            passive: options.passive,
            once: options.once,
            target_selector: options.selector().map(str::to_owned),
        };

        let teardown = Teardown {
            target: deps.target.clone(),
            target_selector: deps.target_selector.clone(),
            event_types: deps.event_types.clone(),
            handler: deps.handler.clone(),
            capture: deps.capture,
            env: self.env.clone(),
            timing: Rc::downgrade(&self.timing),
            binding: Rc::downgrade(&self.binding),
            spent: Cell::new(false),
        };

        let unchanged = self
            .binding
            .borrow()
            .as_ref()
            .is_some_and(|binding| binding.deps.same_as(&deps));

        if unchanged {
            trace!("Listener inputs unchanged, keeping binding");
        } else {
            self.unbind();
            let binding = self.bind(deps);
            *self.binding.borrow_mut() = Some(binding);
        }

        teardown
    }

    fn memoize(&mut self, callback: Callback<E>, policy: TimingPolicy) -> Handler<E> {
        if let Some(memo) = &self.memo {
            if Rc::ptr_eq(&memo.callback, &callback) && memo.policy == policy {
                return memo.handler.clone();
            }
        }

        trace!(?policy, "Building wrapped handler");
        let handler = wrap_handler(callback.clone(), policy, &self.timing);
        self.memo = Some(MemoizedHandler {
            callback,
            policy,
            handler: handler.clone(),
        });
        handler
    }

    fn bind(&self, deps: EffectDeps<E>) -> Binding<E> {
        if !deps.enabled {
            debug!("Listener disabled, nothing attached");
            return Binding {
                deps,
                attached: Vec::new(),
            };
        }

        let targets = deps.target.resolve(deps.target_selector.as_deref(), &self.env);
        if targets.is_empty() {
            debug!(target = ?deps.target, "No targets resolved, nothing attached");
            return Binding {
                deps,
                attached: Vec::new(),
            };
        }

        let registration = RegistrationOptions {
            capture: deps.capture,
            passive: deps.passive,
            once: deps.once,
        };

        let mut attached = Vec::with_capacity(targets.len() * deps.event_types.len());
        for target in &targets {
            for event_type in deps.event_types.iter() {
                target.add_event_listener(event_type, deps.handler.clone(), registration);
                trace!(event_type, ?registration, "Attached listener");
                attached.push(Attachment {
                    target: target.clone(),
                    event_type: event_type.to_string(),
                });
            }
        }

        debug!(
            targets = targets.len(),
            event_types = deps.event_types.len(),
            "Listener bound"
        );
        Binding { deps, attached }
    }
}

impl<E: 'static> ListenerHook<E> {
    /// Tear down the binding and cancel timers. The hook may be rendered
    /// again afterwards.
    pub fn unmount(&mut self) {
        self.unbind();
        self.memo = None;
    }

    /// Number of live (target, event type) registrations.
    pub fn attached_count(&self) -> usize {
        self.binding
            .borrow()
            .as_ref()
            .map_or(0, |binding| binding.attached.len())
    }

    /// Whether a binding exists (possibly with no registrations).
    pub fn is_mounted(&self) -> bool {
        self.binding.borrow().is_some()
    }

    /// Timers scheduled by this hook that have not yet fired.
    pub fn pending_timers(&self) -> usize {
        self.timing.pending()
    }

    /// The handler currently registered on targets, if any.
    pub fn handler(&self) -> Option<Handler<E>> {
        self.memo.as_ref().map(|memo| memo.handler.clone())
    }

    fn unbind(&self) {
        let previous = self.binding.borrow_mut().take();
        if let Some(binding) = previous {
            binding.detach();
        }
        self.timing.cancel_pending();
    }
}

impl<E: 'static> Drop for ListenerHook<E> {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl<E: 'static> fmt::Debug for ListenerHook<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.binding.borrow();
        f.debug_struct("ListenerHook")
            .field("mounted", &binding.is_some())
            .field("attached", &binding.as_ref().map_or(0, |b| b.attached.len()))
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

/// Manual, idempotent teardown returned by [`ListenerHook::render`].
///
/// Targets are re-resolved when the teardown runs: refs and selectors are
/// read again, concrete targets are used as given.
pub struct Teardown<E: 'static> {
    target: TargetSpec<E>,
    target_selector: Option<String>,
    event_types: EventTypes,
    handler: Handler<E>,
    capture: bool,
    env: Environment<E>,
    timing: Weak<TimingState>,
    binding: Weak<RefCell<Option<Binding<E>>>>,
    spent: Cell<bool>,
}

impl<E: 'static> Teardown<E> {
    /// Detach and cancel pending timers. Later calls do nothing.
    pub fn call(&self) {
        if self.spent.replace(true) {
            return;
        }

        let targets = self.target.resolve(self.target_selector.as_deref(), &self.env);
        for target in &targets {
            for event_type in self.event_types.iter() {
                target.remove_event_listener(event_type, &self.handler, self.capture);
            }
        }
        debug!(
            targets = targets.len(),
            dynamic = self.target.is_dynamic() || self.target_selector.is_some(),
            "Manual teardown"
        );

        if let Some(binding) = self.binding.upgrade() {
            if let Some(active) = binding.borrow_mut().as_mut() {
                if Rc::ptr_eq(&active.deps.handler, &self.handler) {
                    active.forget(&targets, &self.event_types);
                }
            }
        }

        if let Some(timing) = self.timing.upgrade() {
            timing.cancel_pending();
        }
    }

    /// Whether [`Teardown::call`] has run.
    pub fn is_spent(&self) -> bool {
        self.spent.get()
    }
}

impl<E: 'static> fmt::Debug for Teardown<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("target", &self.target)
            .field("event_types", &self.event_types)
            .field("spent", &self.spent.get())
            .finish_non_exhaustive()
    }
}

/// A mounted hook that owns its single render, for callers without a
/// render loop. Dropping it unmounts.
pub struct Listener<E: 'static> {
    hook: ListenerHook<E>,
    teardown: Teardown<E>,
}

impl<E: Clone + 'static> Listener<E> {
    /// Detach early; idempotent.
    pub fn teardown(&self) {
        self.teardown.call();
    }

    /// The underlying hook, e.g. to render again with new inputs.
    pub fn hook_mut(&mut self) -> &mut ListenerHook<E> {
        &mut self.hook
    }

    /// Number of live registrations.
    pub fn attached_count(&self) -> usize {
        self.hook.attached_count()
    }
}

impl<E: 'static> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("hook", &self.hook)
            .field("teardown", &self.teardown)
            .finish()
    }
}

/// Attach `callback` to `target` for `event_types` and keep it attached
/// until the returned [`Listener`] is torn down or dropped.
pub fn attach_listener<E: Clone + 'static>(
    env: &Environment<E>,
    target: TargetSpec<E>,
    event_types: impl Into<EventTypes>,
    callback: Callback<E>,
    options: &ListenerOptions,
) -> Listener<E> {
    let mut hook = ListenerHook::new(env.clone());
    let teardown = hook.render(target, event_types, callback, options);
    Listener { hook, teardown }
}
