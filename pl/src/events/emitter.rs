//! Event sinks and the per-participant emitter handle

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::types::{Event, Severity};
use crate::wire::{CommandResult, Role, Roles, WorkItem};

/// Consumer of narration events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Keeps every event in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of events matching `pred`
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| pred(event))
            .count()
    }

    /// Text of every audit record, in emission order
    pub fn audit_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Audit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// Handle for components to emit events bound to one role
///
/// Cheap to clone; convenience methods fill in the role.
#[derive(Clone)]
pub struct Emitter {
    sink: Arc<dyn EventSink>,
    role: Role,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").field("role", &self.role).finish_non_exhaustive()
    }
}

impl Emitter {
    pub fn new(sink: Arc<dyn EventSink>, role: Role) -> Self {
        debug!(%role, "Emitter::new: called");
        Self { sink, role }
    }

    /// Emitter that drops everything
    pub fn null(role: Role) -> Self {
        Self::new(Arc::new(NullSink), role)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Emit a raw event
    pub fn emit(&self, event: Event) {
        debug!(event_type = event.event_type(), "Emitter::emit");
        self.sink.emit(event);
    }

    // === Convenience methods ===

    pub fn bound(&self, addr: Option<SocketAddr>) {
        self.emit(Event::Bound { role: self.role, addr });
    }

    pub fn stopping(&self, reason: &str) {
        self.emit(Event::Stopping {
            role: self.role,
            reason: reason.to_string(),
        });
    }

    pub fn shutdown_broadcast(&self) {
        self.emit(Event::ShutdownBroadcast { role: self.role });
    }

    pub fn released(&self) {
        self.emit(Event::Released { role: self.role });
    }

    pub fn item_received(&self, item: WorkItem) {
        self.emit(Event::ItemReceived { role: self.role, item });
    }

    pub fn item_accepted(&self, item: WorkItem) {
        self.emit(Event::ItemAccepted { role: self.role, item });
    }

    pub fn item_rejected(&self, item: WorkItem) {
        self.emit(Event::ItemRejected { role: self.role, item });
    }

    pub fn item_sent(&self, item: WorkItem) {
        self.emit(Event::ItemSent { role: self.role, item });
    }

    pub fn audit(&self, severity: Severity, text: &str) {
        self.emit(Event::Audit {
            role: self.role,
            severity,
            text: text.to_string(),
        });
    }

    pub fn record_dropped(&self, text: &str) {
        self.emit(Event::RecordDropped {
            role: self.role,
            text: text.to_string(),
        });
    }

    pub fn log_received(&self, text: &str) {
        self.emit(Event::LogReceived {
            role: self.role,
            text: text.to_string(),
        });
    }

    pub fn command_sent(&self, target: Roles) {
        self.emit(Event::CommandSent { role: self.role, target });
    }

    pub fn command_answered(&self, target: Roles, result: CommandResult) {
        self.emit(Event::CommandAnswered {
            role: self.role,
            target,
            result,
        });
    }
}
