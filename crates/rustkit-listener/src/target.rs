//! Dispatch targets and target resolution.
//!
//! A [`TargetSpec`] describes *where* a listener should be attached. It is
//! resolved against an [`Environment`] into an ordered list of concrete
//! [`EventTarget`]s every time the binding (re-)runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::env::Environment;

/// A listener as stored by a dispatch target.
///
/// Identity (`Rc::ptr_eq`) is what removal matches on.
pub type Handler<E> = Rc<dyn Fn(&E)>;

/// A shared, type-erased dispatch target.
pub type SharedTarget<E> = Rc<dyn EventTarget<E>>;

/// Options forwarded verbatim to [`EventTarget::add_event_listener`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationOptions {
    /// Invoke the listener during the capture phase.
    pub capture: bool,
    /// The listener promises not to cancel the event.
    pub passive: bool,
    /// The target should drop the listener after its first invocation.
    pub once: bool,
}

/// Anything that can hold listeners for named events.
pub trait EventTarget<E> {
    /// Register `handler` for `event_type`.
    fn add_event_listener(&self, event_type: &str, handler: Handler<E>, options: RegistrationOptions);

    /// Remove a registration previously made with the same handler and
    /// capture flag. Removing an unknown registration is a no-op.
    fn remove_event_listener(&self, event_type: &str, handler: &Handler<E>, capture: bool);
}

/// A mutable slot holding a possibly-absent target, shared between the
/// owner that fills it and the bindings that read it.
pub struct TargetRef<E: 'static> {
    current: Rc<RefCell<Option<SharedTarget<E>>>>,
}

impl<E: 'static> TargetRef<E> {
    /// Create an empty ref.
    pub fn new() -> Self {
        Self {
            current: Rc::new(RefCell::new(None)),
        }
    }

    /// Create a ref already pointing at `target`.
    pub fn with_target(target: SharedTarget<E>) -> Self {
        let slot = Self::new();
        slot.set(target);
        slot
    }

    /// Point the ref at `target`.
    pub fn set(&self, target: SharedTarget<E>) {
        *self.current.borrow_mut() = Some(target);
    }

    /// Empty the ref.
    pub fn clear(&self) {
        self.current.borrow_mut().take();
    }

    /// The current target, if any.
    pub fn current(&self) -> Option<SharedTarget<E>> {
        self.current.borrow().clone()
    }

    /// Whether both handles share the same slot.
    pub fn same_slot(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.current, &other.current)
    }
}

impl<E: 'static> Clone for TargetRef<E> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<E: 'static> Default for TargetRef<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> fmt::Debug for TargetRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRef")
            .field("is_set", &self.current.borrow().is_some())
            .finish()
    }
}

/// Where a listener should be attached.
pub enum TargetSpec<E: 'static> {
    /// A concrete target, treated as static.
    Element(SharedTarget<E>),
    /// A ref whose current value is read at resolution time.
    Ref(TargetRef<E>),
    /// Every element in the document matching a CSS selector.
    Selector(String),
    /// An explicit "no target".
    Null,
    /// No target given: the environment's global scope.
    Global,
}

impl<E: 'static> TargetSpec<E> {
    /// Shorthand for [`TargetSpec::Selector`].
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    /// Resolve to concrete targets.
    ///
    /// A non-empty `selector_override` wins over whatever `self` is.
    pub fn resolve(&self, selector_override: Option<&str>, env: &Environment<E>) -> Vec<SharedTarget<E>> {
        if let Some(selector) = selector_override.filter(|s| !s.is_empty()) {
            return query(selector, env);
        }

        match self {
            TargetSpec::Element(target) => vec![target.clone()],
            TargetSpec::Ref(slot) => slot.current().into_iter().collect(),
            TargetSpec::Selector(selector) if selector.is_empty() => Vec::new(),
            TargetSpec::Selector(selector) => query(selector, env),
            TargetSpec::Null => Vec::new(),
            TargetSpec::Global => env.global().into_iter().collect(),
        }
    }

    /// Identity comparison used to decide whether a binding must re-run.
    ///
    /// Targets and refs compare by pointer, selectors by value.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (TargetSpec::Element(a), TargetSpec::Element(b)) => Rc::ptr_eq(a, b),
            (TargetSpec::Ref(a), TargetSpec::Ref(b)) => a.same_slot(b),
            (TargetSpec::Selector(a), TargetSpec::Selector(b)) => a == b,
            (TargetSpec::Null, TargetSpec::Null) => true,
            (TargetSpec::Global, TargetSpec::Global) => true,
            _ => false,
        }
    }

    /// Whether resolution depends on state read at call time.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, TargetSpec::Ref(_) | TargetSpec::Selector(_))
    }
}

fn query<E: 'static>(selector: &str, env: &Environment<E>) -> Vec<SharedTarget<E>> {
    match env.document() {
        Some(document) => {
            let matched = document.query_selector_all(selector);
            trace!(selector, matched = matched.len(), "Resolved selector");
            matched
        }
        None => {
            trace!(selector, "No document, selector resolves to nothing");
            Vec::new()
        }
    }
}

impl<E: 'static> Clone for TargetSpec<E> {
    fn clone(&self) -> Self {
        match self {
            TargetSpec::Element(target) => TargetSpec::Element(target.clone()),
            TargetSpec::Ref(slot) => TargetSpec::Ref(slot.clone()),
            TargetSpec::Selector(selector) => TargetSpec::Selector(selector.clone()),
            TargetSpec::Null => TargetSpec::Null,
            TargetSpec::Global => TargetSpec::Global,
        }
    }
}

impl<E: 'static> Default for TargetSpec<E> {
    fn default() -> Self {
        TargetSpec::Global
    }
}

impl<E: 'static> From<SharedTarget<E>> for TargetSpec<E> {
    fn from(target: SharedTarget<E>) -> Self {
        TargetSpec::Element(target)
    }
}

impl<E: 'static> From<TargetRef<E>> for TargetSpec<E> {
    fn from(slot: TargetRef<E>) -> Self {
        TargetSpec::Ref(slot)
    }
}

impl<E: 'static> From<Option<SharedTarget<E>>> for TargetSpec<E> {
    fn from(target: Option<SharedTarget<E>>) -> Self {
        target.map_or(TargetSpec::Null, TargetSpec::Element)
    }
}

impl<E: 'static> fmt::Debug for TargetSpec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Element(target) => f
                .debug_tuple("Element")
                .field(&Rc::as_ptr(target).cast::<()>())
                .finish(),
            TargetSpec::Ref(slot) => f.debug_tuple("Ref").field(slot).finish(),
            TargetSpec::Selector(selector) => f.debug_tuple("Selector").field(selector).finish(),
            TargetSpec::Null => f.write_str("Null"),
            TargetSpec::Global => f.write_str("Global"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::DocumentQuery;
    use crate::registry::ListenerRegistry;
    use crate::timers::VirtualTimers;
    use std::collections::HashMap;

    struct FixedDocument {
        matches: HashMap<String, Vec<SharedTarget<u32>>>,
    }

    impl DocumentQuery<u32> for FixedDocument {
        fn query_selector_all(&self, selector: &str) -> Vec<SharedTarget<u32>> {
            self.matches.get(selector).cloned().unwrap_or_default()
        }
    }

    fn target() -> SharedTarget<u32> {
        Rc::new(ListenerRegistry::<u32>::new())
    }

    fn env_with(global: SharedTarget<u32>, buttons: Vec<SharedTarget<u32>>) -> Environment<u32> {
        let document = FixedDocument {
            matches: HashMap::from([(".btn".to_string(), buttons)]),
        };
        Environment::new(Rc::new(VirtualTimers::new()))
            .with_global(global)
            .with_document(Rc::new(document))
    }

    #[test]
    fn test_global_resolves_to_window() {
        let window = target();
        let env = env_with(window.clone(), Vec::new());

        let resolved = TargetSpec::Global.resolve(None, &env);
        assert_eq!(resolved.len(), 1);
        assert!(Rc::ptr_eq(&resolved[0], &window));
    }

    #[test]
    fn test_global_without_scope_is_empty() {
        let env = Environment::<u32>::new(Rc::new(VirtualTimers::new()));
        assert!(TargetSpec::Global.resolve(None, &env).is_empty());
        assert!(TargetSpec::selector(".btn").resolve(None, &env).is_empty());
    }

    #[test]
    fn test_null_and_empty_ref_resolve_to_nothing() {
        let env = env_with(target(), Vec::new());
        assert!(TargetSpec::Null.resolve(None, &env).is_empty());
        assert!(TargetSpec::Ref(TargetRef::new()).resolve(None, &env).is_empty());
        assert!(TargetSpec::from(None).resolve(None, &env).is_empty());
    }

    #[test]
    fn test_ref_reads_current_value() {
        let env = env_with(target(), Vec::new());
        let slot = TargetRef::new();
        let spec = TargetSpec::Ref(slot.clone());
        assert!(spec.resolve(None, &env).is_empty());

        let button = target();
        slot.set(button.clone());
        let resolved = spec.resolve(None, &env);
        assert!(Rc::ptr_eq(&resolved[0], &button));

        slot.clear();
        assert!(spec.resolve(None, &env).is_empty());
    }

    #[test]
    fn test_selector_override_ignores_direct_target() {
        let buttons = vec![target(), target(), target()];
        let env = env_with(target(), buttons.clone());
        let direct = TargetSpec::Element(target());

        let resolved = direct.resolve(Some(".btn"), &env);
        assert_eq!(resolved.len(), 3);
        for (got, want) in resolved.iter().zip(&buttons) {
            assert!(Rc::ptr_eq(got, want));
        }

        // An empty override is the same as none.
        assert_eq!(direct.resolve(Some(""), &env).len(), 1);
    }

    #[test]
    fn test_same_as() {
        let a = target();
        let slot = TargetRef::<u32>::new();

        assert!(TargetSpec::Element(a.clone()).same_as(&TargetSpec::Element(a.clone())));
        assert!(!TargetSpec::Element(a).same_as(&TargetSpec::Element(target())));
        assert!(TargetSpec::Ref(slot.clone()).same_as(&TargetSpec::Ref(slot)));
        assert!(!TargetSpec::Ref(TargetRef::<u32>::new()).same_as(&TargetSpec::Ref(TargetRef::new())));
        assert!(TargetSpec::<u32>::selector("a").same_as(&TargetSpec::selector("a")));
        assert!(!TargetSpec::<u32>::Null.same_as(&TargetSpec::Global));
    }
}
