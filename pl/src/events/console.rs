//! Console renderer for narration events

use colored::Colorize;

use super::emitter::EventSink;
use super::types::{Event, Severity};
use crate::wire::CommandResult;

/// Prints every event as one colored line on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

/// Plain-text rendering of an event, without color
pub fn render(event: &Event) -> String {
    match event {
        Event::Bound { role, addr: Some(addr) } => format!("{role} bound to {addr}"),
        Event::Bound { role, addr: None } => format!("{role} started"),
        Event::Stopping { role, reason } => format!("{role} stopping: {reason}"),
        Event::ShutdownBroadcast { .. } => "Shutdown signal sent to all clients".to_string(),
        Event::Released { .. } => "All resources released".to_string(),
        Event::ItemReceived { item, .. } => format!("Received {item}"),
        Event::ItemAccepted { item, .. } => format!("Accepted {item}"),
        Event::ItemRejected { item, .. } => format!("Rejected {item}"),
        Event::ItemSent { item, .. } => format!("Sent {item}"),
        Event::Audit { text, .. } => text.clone(),
        Event::RecordDropped { text, .. } => format!("Log queue full, dropped: {text}"),
        Event::LogReceived { text, .. } => text.clone(),
        Event::CommandSent { target, .. } => format!("Asked coordinator to disable {target}"),
        Event::CommandAnswered { target, result, .. } => format!("Disable {target}: {result}"),
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: Event) {
        let line = render(&event);
        match &event {
            Event::Bound { .. } | Event::Released { .. } => println!("{}", line.bright_cyan()),
            Event::Stopping { .. } | Event::ShutdownBroadcast { .. } => println!("{}", line.yellow()),
            Event::ItemAccepted { .. } | Event::ItemSent { .. } => println!("{}", line.green()),
            Event::ItemRejected { .. } => println!("{}", line.red()),
            Event::RecordDropped { .. } => println!("{}", line.yellow()),
            Event::Audit { severity, .. } => match severity {
                Severity::Info => println!("{line}"),
                Severity::Warning => println!("{}", line.yellow()),
                Severity::Error => println!("{}", line.red()),
            },
            Event::CommandAnswered { result, .. } => match result {
                CommandResult::Success => println!("{}", line.green()),
                _ => println!("{}", line.red()),
            },
            Event::ItemReceived { .. } | Event::LogReceived { .. } | Event::CommandSent { .. } => {
                println!("{}", line.dimmed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Role, Roles, WorkItem};

    #[test]
    fn test_render_item_events() {
        let event = Event::ItemRejected {
            role: Role::FirstStage,
            item: WorkItem::new(9),
        };
        assert_eq!(render(&event), "Rejected pin[pin_id=9]");
    }

    #[test]
    fn test_render_command_answer() {
        let event = Event::CommandAnswered {
            role: Role::Operator,
            target: Roles::SECOND_STAGE,
            result: CommandResult::InvalidArguments,
        };
        assert_eq!(
            render(&event),
            "Disable second stage worker: invalid command arguments"
        );
    }

    #[test]
    fn test_render_bound_with_address() {
        let event = Event::Bound {
            role: Role::LogsCollector,
            addr: Some("127.0.0.1:4000".parse().unwrap()),
        };
        assert_eq!(render(&event), "logs collector bound to 127.0.0.1:4000");
    }
}
