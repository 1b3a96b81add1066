//! Fixed-size envelope codec
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! 0       4         8      12                                    512
//! +-------+---------+------+--------------------------------------+
//! |sender |receivers| kind | payload (zero padded)                |
//! +-------+---------+------+--------------------------------------+
//! ```
//!
//! The payload's meaning is selected by `kind`. Bytes past the active payload
//! member are written as zero and ignored on decode.

use std::fmt;

use thiserror::Error;

use super::role::{Role, Roles};

/// Total size of every datagram on the channel
pub const ENVELOPE_SIZE: usize = 512;

/// Sender + receivers + kind
pub const HEADER_SIZE: usize = 3 * size_of::<u32>();

/// Bytes available to the payload union
pub const PAYLOAD_CAPACITY: usize = ENVELOPE_SIZE - HEADER_SIZE;

/// Errors produced while decoding a datagram
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Datagram too short: {len} bytes, expected 512")]
    Truncated { len: usize },

    #[error("Invalid sender role bits {bits:#x}")]
    InvalidSender { bits: u32 },

    #[error("Unknown message kind {kind} from {sender}")]
    UnknownKind { kind: u32, sender: Roles },

    #[error("Unknown command result code {code}")]
    InvalidCommandResult { code: u32 },
}

/// Message kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Kind {
    WorkItem = 0,
    Announce = 1,
    Command = 2,
    CommandResult = 3,
    Shutdown = 4,
    Log = 5,
}

impl Kind {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Kind::WorkItem => "work item",
            Kind::Announce => "announce",
            Kind::Command => "command",
            Kind::CommandResult => "command result",
            Kind::Shutdown => "shutdown",
            Kind::Log => "log",
        }
    }
}

impl TryFrom<u32> for Kind {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Kind::WorkItem),
            1 => Ok(Kind::Announce),
            2 => Ok(Kind::Command),
            3 => Ok(Kind::CommandResult),
            4 => Ok(Kind::Shutdown),
            5 => Ok(Kind::Log),
            other => Err(other),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit of work flowing through the stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub id: u32,
}

impl WorkItem {
    pub fn new(id: u32) -> Self {
        Self { id }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin[pin_id={}]", self.id)
    }
}

/// Operator request: disable every participant of `target`
///
/// `target` is kept raw so the coordinator can answer malformed masks with
/// [`CommandResult::InvalidArguments`] instead of failing to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub target: Roles,
}

impl Command {
    pub fn disable(target: Roles) -> Self {
        Self { target }
    }
}

/// Outcome of an operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandResult {
    Success = 0,
    InvalidArguments = 1,
    InternalError = 2,
    /// Produced by the operator itself when no reply arrives
    NoConnection = 3,
}

impl CommandResult {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for CommandResult {
    type Error = DecodeError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CommandResult::Success),
            1 => Ok(CommandResult::InvalidArguments),
            2 => Ok(CommandResult::InternalError),
            3 => Ok(CommandResult::NoConnection),
            code => Err(DecodeError::InvalidCommandResult { code }),
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandResult::Success => "success",
            CommandResult::InvalidArguments => "invalid command arguments",
            CommandResult::InternalError => "internal error",
            CommandResult::NoConnection => "no connection to the coordinator",
        };
        f.write_str(s)
    }
}

/// Bounded audit text; never longer than [`PAYLOAD_CAPACITY`] bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogRecord {
    text: String,
}

impl LogRecord {
    /// Build a record, truncating at a char boundary and at the first NUL
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if let Some(nul) = text.find('\0') {
            text.truncate(nul);
        }
        if text.len() > PAYLOAD_CAPACITY {
            let mut end = PAYLOAD_CAPACITY;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn from_wire(bytes: &[u8]) -> Self {
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Self::new(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Kind-tagged payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    WorkItem(WorkItem),
    Announce,
    Command(Command),
    CommandResult(CommandResult),
    Shutdown,
    Log(LogRecord),
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::WorkItem(_) => Kind::WorkItem,
            Payload::Announce => Kind::Announce,
            Payload::Command(_) => Kind::Command,
            Payload::CommandResult(_) => Kind::CommandResult,
            Payload::Shutdown => Kind::Shutdown,
            Payload::Log(_) => Kind::Log,
        }
    }
}

/// Raw header fields, readable without validating the rest of the datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sender: Roles,
    pub receivers: Roles,
    pub kind: u32,
}

impl Header {
    /// Read the header of `bytes`, or `None` if it is too short to carry one
    pub fn peek(bytes: &[u8]) -> Option<Header> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        Some(Header {
            sender: Roles::from_bits(read_u32(bytes, 0)),
            receivers: Roles::from_bits(read_u32(bytes, 4)),
            kind: read_u32(bytes, 8),
        })
    }

    /// Sent by the coordinator and addressed to `role`
    pub fn is_from_coordinator_to(&self, role: Role) -> bool {
        self.sender == Roles::COORDINATOR && self.receivers.intersects(role.into())
    }
}

/// The unit of wire transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: Role,
    pub receivers: Roles,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(sender: Role, receivers: Roles, payload: Payload) -> Self {
        Self {
            sender,
            receivers,
            payload,
        }
    }

    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }

    /// Whether `role` is among the receivers
    pub fn is_addressed_to(&self, role: Role) -> bool {
        self.receivers.intersects(role.into())
    }

    pub fn encode(&self) -> [u8; ENVELOPE_SIZE] {
        let mut buf = [0u8; ENVELOPE_SIZE];
        buf[0..4].copy_from_slice(&self.sender.bits().to_le_bytes());
        buf[4..8].copy_from_slice(&self.receivers.bits().to_le_bytes());
        buf[8..12].copy_from_slice(&self.kind().code().to_le_bytes());

        let payload = &mut buf[HEADER_SIZE..];
        match &self.payload {
            Payload::WorkItem(item) => payload[0..4].copy_from_slice(&item.id.to_le_bytes()),
            Payload::Command(command) => payload[0..4].copy_from_slice(&command.target.bits().to_le_bytes()),
            Payload::CommandResult(result) => payload[0..4].copy_from_slice(&result.code().to_le_bytes()),
            Payload::Log(record) => {
                let text = record.as_str().as_bytes();
                payload[..text.len()].copy_from_slice(text);
            }
            Payload::Announce | Payload::Shutdown => {}
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < ENVELOPE_SIZE {
            return Err(DecodeError::Truncated { len: bytes.len() });
        }
        let header = Header::peek(bytes).ok_or(DecodeError::Truncated { len: bytes.len() })?;
        let sender = header
            .sender
            .single()
            .ok_or(DecodeError::InvalidSender {
                bits: header.sender.bits(),
            })?;
        let kind = Kind::try_from(header.kind).map_err(|kind| DecodeError::UnknownKind {
            kind,
            sender: header.sender,
        })?;

        let payload = &bytes[HEADER_SIZE..ENVELOPE_SIZE];
        let payload = match kind {
            Kind::WorkItem => Payload::WorkItem(WorkItem::new(read_u32(payload, 0))),
            Kind::Announce => Payload::Announce,
            Kind::Command => Payload::Command(Command::disable(Roles::from_bits(read_u32(payload, 0)))),
            Kind::CommandResult => Payload::CommandResult(CommandResult::try_from(read_u32(payload, 0))?),
            Kind::Shutdown => Payload::Shutdown,
            Kind::Log => Payload::Log(LogRecord::from_wire(payload)),
        };

        Ok(Envelope {
            sender,
            receivers: header.receivers,
            payload,
        })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}
