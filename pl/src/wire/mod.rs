//! Wire protocol shared by every participant
//!
//! All participants bind one broadcast endpoint, so every datagram reaches
//! everybody. Relevance is decided on the receiving side by testing the
//! envelope's receiver mask against the receiver's own [`Role`].

mod envelope;
mod role;

pub use envelope::{
    Command, CommandResult, DecodeError, ENVELOPE_SIZE, Envelope, HEADER_SIZE, Header, Kind, LogRecord,
    PAYLOAD_CAPACITY, Payload, WorkItem,
};
pub use role::{Role, Roles};
