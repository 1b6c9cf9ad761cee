//! Best-effort usage tracking.
//!
//! Tracking is a capability like [`Ui`](crate::ui::Ui): the front end
//! decides where events go. Implementations must never fail the calling
//! operation; anything that goes wrong while delivering an event is
//! swallowed by the implementation.

use std::collections::BTreeMap;

/// A single tracking event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub category: String,
    pub action: String,
    pub label: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl Event {
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Event {
            category: category.into(),
            action: action.into(),
            label: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Sink for tracking events.
pub trait Tracker {
    fn track(&self, event: &Event);
}

/// Tracker that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracker;

impl Tracker for NullTracker {
    fn track(&self, _event: &Event) {}
}
