//! Datagram transports and channel errors

mod error;
mod memory;
mod socket;
mod transport;

pub use error::{ChannelError, ErrorClass, classify_io};
pub use memory::{MemoryEndpoint, MemoryHub};
pub use socket::BroadcastSocket;
pub use transport::Transport;
