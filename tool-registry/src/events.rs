//! Registry lifecycle events and their observers.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tool_primitives::ToolId;
use tracing::info;

/// Change applied to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A tool was added.
    Registered {
        /// Registered tool.
        tool_id: ToolId,
        /// Display name.
        tool_name: String,
        /// When the change happened.
        at: DateTime<Utc>,
    },
    /// A tool was removed.
    Unregistered {
        /// Removed tool.
        tool_id: ToolId,
        /// Display name.
        tool_name: String,
        /// When the change happened.
        at: DateTime<Utc>,
    },
    /// A tool's enabled flag changed.
    EnabledChanged {
        /// Affected tool.
        tool_id: ToolId,
        /// Display name.
        tool_name: String,
        /// New value of the flag.
        enabled: bool,
        /// When the change happened.
        at: DateTime<Utc>,
    },
}

impl RegistryEvent {
    /// Returns the tool the event refers to.
    #[must_use]
    pub fn tool_id(&self) -> &ToolId {
        match self {
            Self::Registered { tool_id, .. }
            | Self::Unregistered { tool_id, .. }
            | Self::EnabledChanged { tool_id, .. } => tool_id,
        }
    }
}

/// Observer notified after every registry change.
pub trait RegistryObserver: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &RegistryEvent);
}

/// Observer that writes events to the tracing system.
#[derive(Debug, Default)]
pub struct TracingRegistryObserver;

impl RegistryObserver for TracingRegistryObserver {
    fn on_event(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Registered {
                tool_id, tool_name, ..
            } => info!(tool_id = %tool_id, tool_name, "tool registered"),
            RegistryEvent::Unregistered {
                tool_id, tool_name, ..
            } => info!(tool_id = %tool_id, tool_name, "tool unregistered"),
            RegistryEvent::EnabledChanged {
                tool_id,
                tool_name,
                enabled,
                ..
            } => info!(tool_id = %tool_id, tool_name, enabled, "tool enabled state changed"),
        }
    }
}

/// Fans events out to several observers.
pub struct CompositeRegistryObserver {
    observers: Vec<Arc<dyn RegistryObserver>>,
}

impl CompositeRegistryObserver {
    /// Creates a composite from the supplied observers.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn RegistryObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn RegistryObserver>) {
        self.observers.push(observer);
    }
}

impl RegistryObserver for CompositeRegistryObserver {
    fn on_event(&self, event: &RegistryEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Observer that keeps every event, for tests.
#[derive(Debug, Default)]
pub struct CollectingRegistryObserver {
    events: Mutex<Vec<RegistryEvent>>,
}

impl CollectingRegistryObserver {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns and clears the collected events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn drain(&self) -> Vec<RegistryEvent> {
        let mut lock = self.events.lock().expect("registry collector poisoned");
        lock.drain(..).collect()
    }
}

impl RegistryObserver for CollectingRegistryObserver {
    fn on_event(&self, event: &RegistryEvent) {
        self.events
            .lock()
            .expect("registry collector poisoned")
            .push(event.clone());
    }
}
