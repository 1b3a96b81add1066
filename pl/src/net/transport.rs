//! Datagram transport abstraction
//!
//! Participants talk through a [`Transport`] so the runtime logic can run over
//! a real UDP broadcast socket or the in-process [`super::MemoryHub`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::error::ChannelError;
use crate::wire::Envelope;

/// A broadcast datagram endpoint
///
/// Every datagram sent reaches every endpoint bound to the same channel,
/// including the sender itself.
pub trait Transport: Send + Sync {
    /// Broadcast one datagram, returning the number of bytes written
    fn send(&self, datagram: &[u8]) -> io::Result<usize>;

    /// Block until a datagram arrives (bounded by the read timeout, if set)
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)>;

    /// Look at the next pending datagram without consuming it; never blocks
    fn try_peek(&self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// Consume the next pending datagram; never blocks
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// Bound blocking reads; `None` blocks forever
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Pending asynchronous error on the endpoint (SO_ERROR), if any
    fn take_error(&self) -> io::Result<Option<io::Error>>;

    /// Address this endpoint is bound to, when it has one
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Encode and broadcast one envelope; a partial write is an error
    fn send_envelope(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        let bytes = envelope.encode();
        let sent = self.send(&bytes).map_err(|e| ChannelError::io("sendto", e))?;
        if sent != bytes.len() {
            return Err(ChannelError::ShortWrite {
                op: "sendto",
                sent,
                expected: bytes.len(),
            });
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        (**self).send(datagram)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        (**self).recv_from(buf)
    }

    fn try_peek(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).try_peek(buf)
    }

    fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).try_recv(buf)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        (**self).take_error()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        (**self).local_addr()
    }
}
