//! UDP broadcast socket
//!
//! Every participant binds the same broadcast address and port with
//! `SO_REUSEADDR` and `SO_BROADCAST`, and sends to that same address.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use super::transport::Transport;

/// A UDP socket bound to the shared broadcast endpoint
#[derive(Debug)]
pub struct BroadcastSocket {
    socket: UdpSocket,
    target: SocketAddr,
}

impl BroadcastSocket {
    /// Bind `255.255.255.255:port`
    pub fn bind(port: u16) -> io::Result<Self> {
        Self::bind_addr(SocketAddrV4::new(Ipv4Addr::BROADCAST, port))
    }

    /// Bind an explicit address; datagrams are sent back to the bound address
    pub fn bind_addr(addr: SocketAddrV4) -> io::Result<Self> {
        debug!(%addr, "BroadcastSocket::bind_addr: called");
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&SocketAddr::V4(addr).into())?;

        let socket: UdpSocket = socket.into();
        // Port 0 binds resolve to a real port here
        let target = socket.local_addr()?;
        debug!(%target, "BroadcastSocket::bind_addr: bound");
        Ok(Self { socket, target })
    }

    fn nonblocking<R>(&self, op: impl FnOnce(&UdpSocket) -> io::Result<R>) -> io::Result<Option<R>> {
        self.socket.set_nonblocking(true)?;
        let result = op(&self.socket);
        self.socket.set_nonblocking(false)?;
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Transport for BroadcastSocket {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send_to(datagram, self.target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        let (len, from) = self.socket.recv_from(buf)?;
        Ok((len, Some(from)))
    }

    fn try_peek(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.nonblocking(|socket| socket.peek_from(buf).map(|(len, _)| len))
    }

    fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.nonblocking(|socket| socket.recv_from(buf).map(|(len, _)| len))
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.socket.take_error()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.target)
    }
}
