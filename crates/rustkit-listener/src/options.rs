//! Listener configuration and event type lists.

use std::time::Duration;

use rustkit_common::{Result, RustKitError};
use serde::{Deserialize, Serialize};

use crate::target::RegistrationOptions;

/// Per-binding configuration.
///
/// Deserializes from camelCase JSON; missing fields take their defaults.
/// `debounce` and `delay` are milliseconds, and zero means unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListenerOptions {
    /// Coalescing window in milliseconds (trailing edge).
    pub debounce: Option<u64>,
    /// Fixed postponement in milliseconds. Wins over `debounce`.
    pub delay: Option<u64>,
    /// When false nothing is attached and events are dropped.
    pub enabled: bool,
    /// Fire at most once for the lifetime of the hook.
    pub once: bool,
    /// Forwarded to the registration.
    pub capture: bool,
    /// Forwarded to the registration.
    pub passive: bool,
    /// CSS selector overriding the direct target.
    pub target_selector: Option<String>,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            debounce: None,
            delay: None,
            enabled: true,
            once: false,
            capture: false,
            passive: false,
            target_selector: None,
        }
    }
}

impl ListenerOptions {
    /// Parse options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RustKitError::config_with_source("Invalid listener options", e))
    }

    /// Set the debounce window.
    pub fn debounce(mut self, ms: u64) -> Self {
        self.debounce = Some(ms);
        self
    }

    /// Set the delay.
    pub fn delay(mut self, ms: u64) -> Self {
        self.delay = Some(ms);
        self
    }

    /// Enable or disable the binding.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Fire at most once.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Listen in the capture phase.
    pub fn capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    /// Mark the listener passive.
    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    /// Resolve targets through a CSS selector.
    pub fn target_selector(mut self, selector: impl Into<String>) -> Self {
        self.target_selector = Some(selector.into());
        self
    }

    /// The delay, if set and non-zero.
    pub fn delay_duration(&self) -> Option<Duration> {
        non_zero(self.delay)
    }

    /// The debounce window, if set and non-zero.
    pub fn debounce_duration(&self) -> Option<Duration> {
        non_zero(self.debounce)
    }

    /// The selector, if set and non-empty.
    pub fn selector(&self) -> Option<&str> {
        self.target_selector.as_deref().filter(|s| !s.is_empty())
    }

    /// Options handed to [`crate::EventTarget::add_event_listener`].
    pub fn registration(&self) -> RegistrationOptions {
        RegistrationOptions {
            capture: self.capture,
            passive: self.passive,
            once: self.once,
        }
    }
}

fn non_zero(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|&ms| ms > 0).map(Duration::from_millis)
}

/// One or more event type names, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EventTypes(Vec<String>);

impl EventTypes {
    /// Iterate the names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `event_type` is in the list.
    pub fn contains(&self, event_type: &str) -> bool {
        self.0.iter().any(|t| t == event_type)
    }
}

impl From<&str> for EventTypes {
    fn from(event_type: &str) -> Self {
        Self(vec![event_type.to_string()])
    }
}

impl From<String> for EventTypes {
    fn from(event_type: String) -> Self {
        Self(vec![event_type])
    }
}

impl From<Vec<String>> for EventTypes {
    fn from(event_types: Vec<String>) -> Self {
        Self(event_types)
    }
}

impl From<Vec<&str>> for EventTypes {
    fn from(event_types: Vec<&str>) -> Self {
        event_types.as_slice().into()
    }
}

impl From<&[&str]> for EventTypes {
    fn from(event_types: &[&str]) -> Self {
        Self(event_types.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventTypes {
    fn from(event_types: [&str; N]) -> Self {
        event_types.as_slice().into()
    }
}
