//! The host environment a binding runs in.

use std::fmt;
use std::rc::Rc;

use crate::target::SharedTarget;
use crate::timers::TimerQueue;

/// CSS selector matching over the current document.
pub trait DocumentQuery<E> {
    /// All elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<SharedTarget<E>>;
}

/// Collaborators the listener core consumes but does not implement.
///
/// A headless environment (no global scope, no document) is valid: every
/// DOM-touching operation simply resolves to nothing.
pub struct Environment<E: 'static> {
    global: Option<SharedTarget<E>>,
    document: Option<Rc<dyn DocumentQuery<E>>>,
    timers: Rc<dyn TimerQueue>,
}

impl<E: 'static> Environment<E> {
    /// Create a headless environment backed by `timers`.
    pub fn new(timers: Rc<dyn TimerQueue>) -> Self {
        Self {
            global: None,
            document: None,
            timers,
        }
    }

    /// Set the global target used when no target is given.
    pub fn with_global(mut self, global: SharedTarget<E>) -> Self {
        self.global = Some(global);
        self
    }

    /// Set the document used for selector resolution.
    pub fn with_document(mut self, document: Rc<dyn DocumentQuery<E>>) -> Self {
        self.document = Some(document);
        self
    }

    /// The global target, if this environment has one.
    pub fn global(&self) -> Option<SharedTarget<E>> {
        self.global.clone()
    }

    /// The document, if this environment has one.
    pub fn document(&self) -> Option<&Rc<dyn DocumentQuery<E>>> {
        self.document.as_ref()
    }

    /// The timer queue.
    pub fn timers(&self) -> &Rc<dyn TimerQueue> {
        &self.timers
    }

    /// Whether there is neither a global scope nor a document.
    pub fn is_headless(&self) -> bool {
        self.global.is_none() && self.document.is_none()
    }
}

impl<E: 'static> Clone for Environment<E> {
    fn clone(&self) -> Self {
        Self {
            global: self.global.clone(),
            document: self.document.clone(),
            timers: self.timers.clone(),
        }
    }
}

impl<E: 'static> fmt::Debug for Environment<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("has_global", &self.global.is_some())
            .field("has_document", &self.document.is_some())
            .finish_non_exhaustive()
    }
}
