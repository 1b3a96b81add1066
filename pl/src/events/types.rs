//! Event types for participant narration
//!
//! These events describe everything a participant reports to its operator:
//! - Lifecycle (bound, stopping, released)
//! - Work items (received, accepted, rejected, sent)
//! - Coordinator audit records and dropped records
//! - Operator commands and their results

use std::net::SocketAddr;

use crate::wire::{CommandResult, Role, Roles, WorkItem};

/// Severity of a coordinator audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// The vocabulary of participant activity
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // === Lifecycle ===
    /// The participant's endpoint is bound
    Bound { role: Role, addr: Option<SocketAddr> },
    /// The participant is leaving its main loop
    Stopping { role: Role, reason: String },
    /// The coordinator broadcast its final shutdown notice
    ShutdownBroadcast { role: Role },
    /// All resources were released
    Released { role: Role },

    // === Work items ===
    ItemReceived { role: Role, item: WorkItem },
    ItemAccepted { role: Role, item: WorkItem },
    ItemRejected { role: Role, item: WorkItem },
    ItemSent { role: Role, item: WorkItem },

    // === Audit trail ===
    /// A coordinator audit record
    Audit {
        role: Role,
        severity: Severity,
        text: String,
    },
    /// An audit record did not fit in the log queue
    RecordDropped { role: Role, text: String },
    /// A log record delivered to the logs collector
    LogReceived { role: Role, text: String },

    // === Operator ===
    CommandSent { role: Role, target: Roles },
    CommandAnswered {
        role: Role,
        target: Roles,
        result: CommandResult,
    },
}

impl Event {
    /// The participant that emitted this event
    pub fn role(&self) -> Role {
        match self {
            Event::Bound { role, .. }
            | Event::Stopping { role, .. }
            | Event::ShutdownBroadcast { role }
            | Event::Released { role }
            | Event::ItemReceived { role, .. }
            | Event::ItemAccepted { role, .. }
            | Event::ItemRejected { role, .. }
            | Event::ItemSent { role, .. }
            | Event::Audit { role, .. }
            | Event::RecordDropped { role, .. }
            | Event::LogReceived { role, .. }
            | Event::CommandSent { role, .. }
            | Event::CommandAnswered { role, .. } => *role,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Bound { .. } => "Bound",
            Event::Stopping { .. } => "Stopping",
            Event::ShutdownBroadcast { .. } => "ShutdownBroadcast",
            Event::Released { .. } => "Released",
            Event::ItemReceived { .. } => "ItemReceived",
            Event::ItemAccepted { .. } => "ItemAccepted",
            Event::ItemRejected { .. } => "ItemRejected",
            Event::ItemSent { .. } => "ItemSent",
            Event::Audit { .. } => "Audit",
            Event::RecordDropped { .. } => "RecordDropped",
            Event::LogReceived { .. } => "LogReceived",
            Event::CommandSent { .. } => "CommandSent",
            Event::CommandAnswered { .. } => "CommandAnswered",
        }
    }
}
