//! pinline - broadcast task pipeline
//!
//! A coordinator and five kinds of clients share one UDP broadcast port. Work
//! items ("pins") flow from the first stage through the coordinator to the
//! second and third stages; the coordinator records an audit line for every
//! event and fans those out to logs collectors. An operator can disable whole
//! client roles, and the coordinator tells every client to stop on shutdown.
//!
//! # Modules
//!
//! - [`wire`] - Fixed-size envelope codec and role bitmasks
//! - [`net`] - Broadcast UDP socket, in-memory hub and channel errors
//! - [`client`] - Client runtime contract (announce, filter, stop checks)
//! - [`coordinator`] - Dispatch, log queue and lifecycle
//! - [`worker`] - Stage loops and their stand-in capabilities
//! - [`operator`] - Command channel and interactive console
//! - [`events`] - Console narration
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod net;
pub mod operator;
pub mod signals;
pub mod wire;
pub mod worker;

// Re-export commonly used types
pub use client::{Client, Delivery, Outcome};
pub use config::{Config, NetworkConfig};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, StopToken};
pub use events::{ConsoleSink, Emitter, Event, EventSink};
pub use net::{BroadcastSocket, ChannelError, MemoryHub, Transport};
pub use wire::{Envelope, Payload, Role, Roles, WorkItem};
