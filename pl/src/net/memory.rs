//! In-process broadcast hub
//!
//! Behaves like every endpoint sharing one UDP broadcast port: a datagram sent
//! by any endpoint is queued on every live endpoint, the sender included.
//! Used by integration tests and for running several roles in one process.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tracing::debug;

use super::transport::Transport;

const FIRST_PORT: u16 = 40_000;

type Datagram = (Vec<u8>, SocketAddr);

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Datagram>>,
    ready: Condvar,
}

#[derive(Debug)]
struct HubInner {
    mailboxes: Mutex<Vec<Weak<Mailbox>>>,
    next_port: AtomicU16,
    severed: AtomicBool,
}

/// Shared broadcast medium; clone to hand out to other threads
#[derive(Debug, Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        debug!("MemoryHub::new: called");
        Self {
            inner: Arc::new(HubInner {
                mailboxes: Mutex::new(Vec::new()),
                next_port: AtomicU16::new(FIRST_PORT),
                severed: AtomicBool::new(false),
            }),
        }
    }

    /// Attach a new endpoint; it only sees datagrams sent after this call
    pub fn endpoint(&self) -> MemoryEndpoint {
        let mailbox = Arc::new(Mailbox::default());
        lock_or_recover(&self.inner.mailboxes).push(Arc::downgrade(&mailbox));

        let port = self.inner.next_port.fetch_add(1, Ordering::Relaxed);
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
        debug!(%addr, "MemoryHub::endpoint: attached");

        MemoryEndpoint {
            hub: Arc::clone(&self.inner),
            mailbox,
            addr,
            read_timeout: Mutex::new(None),
        }
    }

    /// Take the medium down: every endpoint sees its connection as gone
    pub fn sever(&self) {
        debug!("MemoryHub::sever: called");
        self.inner.severed.store(true, Ordering::SeqCst);
        for mailbox in lock_or_recover(&self.inner.mailboxes).iter().filter_map(Weak::upgrade) {
            // Take the queue lock so a waiter cannot miss the wakeup
            let _queue = lock_or_recover(&mailbox.queue);
            mailbox.ready.notify_all();
        }
    }
}

/// One participant's view of a [`MemoryHub`]
#[derive(Debug)]
pub struct MemoryEndpoint {
    hub: Arc<HubInner>,
    mailbox: Arc<Mailbox>,
    addr: SocketAddr,
    read_timeout: Mutex<Option<Duration>>,
}

impl MemoryEndpoint {
    fn check_link(&self) -> io::Result<()> {
        if self.hub.severed.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset));
        }
        Ok(())
    }

    fn copy_out(datagram: &[u8], buf: &mut [u8]) -> usize {
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        len
    }

    /// Number of datagrams waiting on this endpoint
    pub fn pending(&self) -> usize {
        lock_or_recover(&self.mailbox.queue).len()
    }
}

impl Transport for MemoryEndpoint {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        if self.hub.severed.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::NetworkUnreachable));
        }

        let mut mailboxes = lock_or_recover(&self.hub.mailboxes);
        mailboxes.retain(|mailbox| mailbox.strong_count() > 0);
        for mailbox in mailboxes.iter().filter_map(Weak::upgrade) {
            lock_or_recover(&mailbox.queue).push_back((datagram.to_vec(), self.addr));
            mailbox.ready.notify_all();
        }
        Ok(datagram.len())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        let timeout = *lock_or_recover(&self.read_timeout);
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        let mut queue = lock_or_recover(&self.mailbox.queue);
        loop {
            self.check_link()?;
            if let Some((datagram, from)) = queue.pop_front() {
                return Ok((Self::copy_out(&datagram, buf), Some(from)));
            }

            queue = match deadline {
                None => self.mailbox.ready.wait(queue).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(io::Error::from(io::ErrorKind::TimedOut));
                    }
                    let (queue, _) = self
                        .mailbox
                        .ready
                        .wait_timeout(queue, remaining)
                        .unwrap_or_else(PoisonError::into_inner);
                    queue
                }
            };
        }
    }

    fn try_peek(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.check_link()?;
        let queue = lock_or_recover(&self.mailbox.queue);
        Ok(queue.front().map(|(datagram, _)| Self::copy_out(datagram, buf)))
    }

    fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.check_link()?;
        let mut queue = lock_or_recover(&self.mailbox.queue);
        Ok(queue.pop_front().map(|(datagram, _)| Self::copy_out(&datagram, buf)))
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        if timeout == Some(Duration::ZERO) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "zero read timeout"));
        }
        *lock_or_recover(&self.read_timeout) = timeout;
        Ok(())
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        Ok(self.check_link().err())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_broadcast_reaches_every_endpoint_including_sender() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();

        a.send(b"hello").unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(a.try_recv(&mut buf).unwrap(), Some(5));
        assert_eq!(b.try_recv(&mut buf).unwrap(), Some(5));
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn test_recv_reports_sender_address() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();
        a.send(b"x").unwrap();

        let mut buf = [0u8; 4];
        let (_, from) = b.recv_from(&mut buf).unwrap();
        assert_eq!(from, a.local_addr());
    }

    #[test]
    fn test_late_endpoint_misses_earlier_datagrams() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        a.send(b"early").unwrap();
        let late = hub.endpoint();
        assert_eq!(late.pending(), 0);
    }

    #[test]
    fn test_peek_leaves_datagram_queued() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        a.send(b"abc").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(a.try_peek(&mut buf).unwrap(), Some(3));
        assert_eq!(a.pending(), 1);
        assert_eq!(a.try_recv(&mut buf).unwrap(), Some(3));
        assert_eq!(a.pending(), 0);
    }

    #[test]
    fn test_recv_times_out() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        a.set_read_timeout(Some(Duration::from_millis(20))).unwrap();

        let mut buf = [0u8; 8];
        let err = a.recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_recv_blocks_until_send() {
        let hub = MemoryHub::new();
        let receiver = hub.endpoint();
        let sender = hub.endpoint();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 8];
            receiver.recv_from(&mut buf).map(|(len, _)| buf[..len].to_vec())
        });
        thread::sleep(Duration::from_millis(20));
        sender.send(b"wake").unwrap();

        assert_eq!(handle.join().unwrap().unwrap(), b"wake".to_vec());
    }

    #[test]
    fn test_sever_wakes_blocked_reader() {
        let hub = MemoryHub::new();
        let receiver = hub.endpoint();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 8];
            receiver.recv_from(&mut buf).map(|(len, _)| len)
        });
        thread::sleep(Duration::from_millis(20));
        hub.sever();

        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_severed_endpoint_reports_pending_error() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        assert!(a.take_error().unwrap().is_none());
        hub.sever();
        assert!(a.take_error().unwrap().is_some());
        assert!(a.send(b"x").is_err());
    }
}
