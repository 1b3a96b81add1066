//! Coordinator dispatch: one datagram in, routing and audit records out

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error};

use super::context::CoordinatorContext;
use crate::events::Severity;
use crate::net::ChannelError;
use crate::wire::{
    Command, CommandResult, DecodeError, ENVELOPE_SIZE, Envelope, Header, Kind, Payload, Role, Roles, WorkItem,
};

/// What a single poll cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Nothing arrived within the poll interval
    Idle,
    /// One datagram was classified and handled
    Dispatched,
}

/// Sender address as shown in audit records
#[derive(Debug, Clone, Copy)]
struct Origin(Option<SocketAddr>);

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "[address={addr}]"),
            None => write!(f, "[address=unknown]"),
        }
    }
}

/// The single role an operator command may target
///
/// Exactly one bit, and that bit must name a client role.
pub fn validate_target(target: Roles) -> Option<Role> {
    target
        .single()
        .filter(|role| Roles::ANY_CLIENT.contains((*role).into()))
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: Arc<CoordinatorContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<CoordinatorContext>) -> Self {
        Self { ctx }
    }

    /// Receive and handle at most one datagram
    ///
    /// A read that times out is [`PollStatus::Idle`]. Any other receive error
    /// and any failed forward are returned to the caller.
    pub fn poll_once(&self) -> Result<PollStatus, ChannelError> {
        let mut buf = [0u8; ENVELOPE_SIZE];
        let (len, from) = match self.ctx.transport().recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) => {
                let err = ChannelError::io("recvfrom", e);
                if err.is_transient() {
                    return Ok(PollStatus::Idle);
                }
                return Err(err);
            }
        };
        self.dispatch(&buf[..len], from)?;
        Ok(PollStatus::Dispatched)
    }

    /// Classify one datagram by sender role and kind
    pub fn dispatch(&self, datagram: &[u8], from: Option<SocketAddr>) -> Result<(), ChannelError> {
        let origin = Origin(from);

        if Header::peek(datagram).is_some_and(|header| header.sender == Roles::COORDINATOR) {
            debug!("Dispatcher::dispatch: ignoring own echo");
            return Ok(());
        }

        let envelope = match Envelope::decode(datagram) {
            Ok(envelope) => envelope,
            Err(DecodeError::UnknownKind { kind, sender }) => {
                self.ctx.record(
                    Severity::Error,
                    format!("Error: unknown message kind[value={kind}] from {sender}{origin}"),
                );
                return Ok(());
            }
            Err(err) => {
                self.ctx
                    .record(Severity::Error, format!("Error: malformed datagram from {origin}: {err}"));
                return Ok(());
            }
        };

        let sender = envelope.sender;
        let kind = envelope.kind();
        match envelope.payload {
            Payload::WorkItem(item) => {
                if !envelope.receivers.intersects(Roles::COORDINATOR) {
                    return Ok(());
                }
                self.on_work_item(sender, item, origin)
            }
            Payload::Announce => {
                self.ctx.record(
                    Severity::Info,
                    format!("New client of role \"{sender}\"{origin} announced its presence"),
                );
                Ok(())
            }
            Payload::Shutdown => {
                self.ctx.record(
                    Severity::Warning,
                    format!("Warning: received shutdown signal from {sender}{origin}"),
                );
                Ok(())
            }
            Payload::Command(command) => self.on_command(sender, command, origin),
            Payload::CommandResult(_) | Payload::Log(_) => {
                self.ctx.record(
                    Severity::Error,
                    format!(
                        "Error: invalid message kind {kind}[value={}] from {sender}{origin}",
                        kind.code()
                    ),
                );
                Ok(())
            }
        }
    }

    fn on_work_item(&self, sender: Role, item: WorkItem, origin: Origin) -> Result<(), ChannelError> {
        self.ctx
            .record(Severity::Info, format!("Received {item} from {sender}{origin}"));

        let Some(next) = sender.next_stage() else {
            self.ctx.record(
                Severity::Error,
                format!("Error: invalid source {sender}{origin} of {item}"),
            );
            return Ok(());
        };

        let stage = match next {
            Role::SecondStage => "second",
            _ => "third",
        };
        self.ctx
            .record(Severity::Info, format!("Transferring {item} to the {stage} stage workers"));
        self.ctx.broadcast(next.into(), Payload::WorkItem(item))
    }

    fn on_command(&self, sender: Role, command: Command, origin: Origin) -> Result<(), ChannelError> {
        if sender != Role::Operator {
            self.ctx.record(
                Severity::Error,
                format!(
                    "Error: invalid message kind {}[value={}] from {sender}{origin}",
                    Kind::Command,
                    Kind::Command.code()
                ),
            );
            return Ok(());
        }

        let result = match validate_target(command.target) {
            None => CommandResult::InvalidArguments,
            Some(target) => match self.ctx.broadcast(target.into(), Payload::Shutdown) {
                Ok(()) => CommandResult::Success,
                Err(err) => {
                    error!(%err, %target, "Dispatcher::on_command: failed to disable role");
                    CommandResult::InternalError
                }
            },
        };

        let severity = match result {
            CommandResult::Success => Severity::Info,
            _ => Severity::Warning,
        };
        self.ctx.record(
            severity,
            format!("Operator{origin} asked to disable {}: {result}", command.target),
        );
        self.ctx.broadcast(Roles::OPERATOR, Payload::CommandResult(result))
    }
}
