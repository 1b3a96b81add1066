//! Client side of the broadcast protocol
//!
//! Every non-coordinator participant wraps its transport in a [`Client`]. The
//! client announces itself on connect, filters the shared channel down to
//! datagrams the coordinator addressed to its role, and reports a coordinator
//! shutdown as [`Delivery::Shutdown`] instead of an error.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::net::{ChannelError, ErrorClass, Transport, classify_io};
use crate::wire::{
    CommandResult, ENVELOPE_SIZE, Envelope, Header, Kind, LogRecord, Payload, Role, Roles, WorkItem,
};

/// Result of a blocking receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    /// The expected payload arrived
    Payload(T),
    /// The coordinator told this role to stop
    Shutdown,
}

/// How a participant's main loop ended without a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Shutdown signal received or channel gone
    Stopped,
    /// The user asked to leave
    Exited,
}

/// Turn a "channel gone" error into a graceful stop
pub fn stop_if_gone<T>(result: Result<T, ChannelError>) -> Result<Option<T>, ChannelError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_gone() => {
            info!(%err, "stop_if_gone: channel gone, stopping");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug)]
pub struct Client<T: Transport> {
    transport: T,
    role: Role,
}

impl<T: Transport> Client<T> {
    /// Wrap `transport` and announce `role` to the coordinator
    pub fn connect(transport: T, role: Role) -> Result<Self, ChannelError> {
        debug!(%role, "Client::connect: called");
        let client = Self { transport, role };
        client.send(Payload::Announce)?;
        info!(%role, addr = ?client.local_addr(), "Client::connect: announced");
        Ok(client)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Bound blocking receives; `None` waits forever
    pub fn set_receive_timeout(&self, timeout: Option<Duration>) -> Result<(), ChannelError> {
        self.transport
            .set_read_timeout(timeout)
            .map_err(|e| ChannelError::io("setsockopt(SO_RCVTIMEO)", e))
    }

    /// Nonblocking check for a coordinator shutdown addressed to this role
    ///
    /// Foreign datagrams at the head of the channel are consumed. A matching
    /// shutdown is consumed and reported. A matching command result is stale
    /// here, since results are only awaited inside a command exchange, and is
    /// dropped. Any other matching datagram is left in place for
    /// [`receive`](Self::receive). A dead channel counts as a stop.
    pub fn should_stop(&self) -> bool {
        match self.transport.take_error() {
            Ok(None) => {}
            Ok(Some(err)) if classify_io(&err) == ErrorClass::Transient => {
                debug!(%err, "Client::should_stop: ignoring transient socket error");
            }
            Ok(Some(err)) => {
                warn!(%err, "Client::should_stop: socket is dead");
                return true;
            }
            Err(err) => {
                warn!(%err, "Client::should_stop: getsockopt(SO_ERROR) failed");
                return true;
            }
        }

        let mut buf = [0u8; ENVELOPE_SIZE];
        loop {
            let len = match self.transport.try_peek(&mut buf) {
                Ok(None) => return false,
                Ok(Some(len)) => len,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => return false,
                Err(err) => {
                    warn!(%err, "Client::should_stop: peek failed");
                    return true;
                }
            };

            match Header::peek(&buf[..len]) {
                Some(header) if header.is_from_coordinator_to(self.role) => {
                    if header.kind == Kind::CommandResult.code() {
                        debug!(role = %self.role, "Client::should_stop: dropping stale command result");
                        if let Err(err) = self.transport.try_recv(&mut buf) {
                            warn!(%err, "Client::should_stop: failed to drop stale command result");
                            return true;
                        }
                        continue;
                    }
                    if header.kind != Kind::Shutdown.code() {
                        return false;
                    }
                    if let Err(err) = self.transport.try_recv(&mut buf) {
                        warn!(%err, "Client::should_stop: failed to consume shutdown");
                    }
                    info!(role = %self.role, "Client::should_stop: shutdown received");
                    return true;
                }
                _ => {
                    if let Err(err) = self.transport.try_recv(&mut buf) {
                        warn!(%err, "Client::should_stop: failed to skip foreign datagram");
                        return true;
                    }
                }
            }
        }
    }

    /// Drop command results already waiting at the head of the channel
    ///
    /// Foreign datagrams ahead of them go too. Stops at the first other
    /// datagram addressed to this role, so a pending shutdown stays queued.
    /// Returns how many results were dropped.
    pub fn discard_stale_results(&self) -> usize {
        let mut buf = [0u8; ENVELOPE_SIZE];
        let mut dropped = 0;
        loop {
            let len = match self.transport.try_peek(&mut buf) {
                Ok(Some(len)) => len,
                Ok(None) | Err(_) => break,
            };
            let stale = match Header::peek(&buf[..len]) {
                Some(header) if header.is_from_coordinator_to(self.role) => {
                    if header.kind != Kind::CommandResult.code() {
                        break;
                    }
                    true
                }
                _ => false,
            };
            if self.transport.try_recv(&mut buf).is_err() {
                break;
            }
            if stale {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(role = %self.role, dropped, "Client::discard_stale_results: dropped stale command results");
        }
        dropped
    }

    /// Block until the coordinator sends `expected` to this role
    pub fn receive(&self, expected: Kind) -> Result<Delivery<Payload>, ChannelError> {
        debug!(role = %self.role, %expected, "Client::receive: called");
        let mut buf = [0u8; ENVELOPE_SIZE];
        loop {
            let (len, _) = self
                .transport
                .recv_from(&mut buf)
                .map_err(|e| ChannelError::io("recv", e))?;
            if len == 0 {
                continue;
            }
            if len != ENVELOPE_SIZE {
                return Err(ChannelError::ShortRead { op: "recv", len });
            }

            let Some(header) = Header::peek(&buf) else {
                continue;
            };
            if header.sender != Roles::COORDINATOR || !header.receivers.intersects(self.role.into()) {
                continue;
            }

            let envelope = Envelope::decode(&buf).map_err(|source| ChannelError::Malformed { op: "recv", source })?;
            if envelope.kind() == Kind::Shutdown {
                info!(role = %self.role, "Client::receive: shutdown received");
                return Ok(Delivery::Shutdown);
            }
            if envelope.kind() == expected {
                return Ok(Delivery::Payload(envelope.payload));
            }
        }
    }

    pub fn receive_item(&self) -> Result<Delivery<WorkItem>, ChannelError> {
        match self.receive(Kind::WorkItem)? {
            Delivery::Payload(Payload::WorkItem(item)) => Ok(Delivery::Payload(item)),
            _ => Ok(Delivery::Shutdown),
        }
    }

    pub fn receive_log(&self) -> Result<Delivery<LogRecord>, ChannelError> {
        match self.receive(Kind::Log)? {
            Delivery::Payload(Payload::Log(record)) => Ok(Delivery::Payload(record)),
            _ => Ok(Delivery::Shutdown),
        }
    }

    pub fn receive_command_result(&self) -> Result<Delivery<CommandResult>, ChannelError> {
        match self.receive(Kind::CommandResult)? {
            Delivery::Payload(Payload::CommandResult(result)) => Ok(Delivery::Payload(result)),
            _ => Ok(Delivery::Shutdown),
        }
    }

    /// Broadcast `payload` addressed to the coordinator
    pub fn send(&self, payload: Payload) -> Result<(), ChannelError> {
        let envelope = Envelope::new(self.role, Roles::COORDINATOR, payload);
        debug!(role = %self.role, kind = %envelope.kind(), "Client::send: called");
        self.transport.send_envelope(&envelope)
    }

    pub fn send_item(&self, item: WorkItem) -> Result<(), ChannelError> {
        self.send(Payload::WorkItem(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{MemoryEndpoint, MemoryHub};
    use crate::wire::Command;

    fn coordinator_says(hub_endpoint: &MemoryEndpoint, receivers: Roles, payload: Payload) {
        let bytes = Envelope::new(Role::Coordinator, receivers, payload).encode();
        hub_endpoint.send(&bytes).unwrap();
    }

    #[test]
    fn test_connect_announces_to_coordinator() {
        let hub = MemoryHub::new();
        let observer = hub.endpoint();
        let _client = Client::connect(hub.endpoint(), Role::SecondStage).unwrap();

        let mut buf = [0u8; ENVELOPE_SIZE];
        observer.try_recv(&mut buf).unwrap().unwrap();
        let envelope = Envelope::decode(&buf).unwrap();
        assert_eq!(envelope.sender, Role::SecondStage);
        assert_eq!(envelope.receivers, Roles::COORDINATOR);
        assert_eq!(envelope.payload, Payload::Announce);
    }

    #[test]
    fn test_connect_fails_on_dead_channel() {
        let hub = MemoryHub::new();
        let endpoint = hub.endpoint();
        hub.sever();
        let err = Client::connect(endpoint, Role::FirstStage).unwrap_err();
        assert!(err.is_gone());
    }

    #[test]
    fn test_should_stop_false_when_idle() {
        let hub = MemoryHub::new();
        let client = Client::connect(hub.endpoint(), Role::FirstStage).unwrap();
        assert!(!client.should_stop());
        // Own announce echo was skipped
        assert_eq!(client.transport().pending(), 0);
    }

    #[test]
    fn test_should_stop_true_on_shutdown() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::ThirdStage).unwrap();

        coordinator_says(&coordinator, Roles::ANY_WORKER, Payload::Shutdown);
        assert!(client.should_stop());
        assert!(!client.should_stop());
    }

    #[test]
    fn test_should_stop_ignores_shutdown_for_other_roles() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::SecondStage).unwrap();

        coordinator_says(&coordinator, Roles::FIRST_STAGE, Payload::Shutdown);
        assert!(!client.should_stop());
    }

    #[test]
    fn test_should_stop_ignores_forged_shutdown() {
        let hub = MemoryHub::new();
        let impostor = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::SecondStage).unwrap();

        let bytes = Envelope::new(Role::Operator, Roles::ANY_CLIENT, Payload::Shutdown).encode();
        impostor.send(&bytes).unwrap();
        assert!(!client.should_stop());
    }

    #[test]
    fn test_should_stop_keeps_matching_work_item() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::SecondStage).unwrap();

        coordinator_says(&coordinator, Roles::SECOND_STAGE, Payload::WorkItem(WorkItem::new(5)));
        assert!(!client.should_stop());
        assert_eq!(client.receive_item().unwrap(), Delivery::Payload(WorkItem::new(5)));
    }

    #[test]
    fn test_should_stop_sees_shutdown_behind_stale_result() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();

        coordinator_says(
            &coordinator,
            Roles::OPERATOR,
            Payload::CommandResult(CommandResult::InvalidArguments),
        );
        coordinator_says(&coordinator, Roles::ANY_CLIENT, Payload::Shutdown);
        assert!(client.should_stop());
        assert_eq!(client.transport().pending(), 0);
    }

    #[test]
    fn test_should_stop_drops_lone_stale_result() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();

        coordinator_says(&coordinator, Roles::OPERATOR, Payload::CommandResult(CommandResult::Success));
        assert!(!client.should_stop());
        assert_eq!(client.transport().pending(), 0);
    }

    #[test]
    fn test_discard_stale_results_keeps_shutdown() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();

        coordinator_says(&coordinator, Roles::OPERATOR, Payload::CommandResult(CommandResult::Success));
        coordinator_says(&coordinator, Roles::OPERATOR, Payload::CommandResult(CommandResult::InvalidArguments));
        coordinator_says(&coordinator, Roles::ANY_CLIENT, Payload::Shutdown);

        assert_eq!(client.discard_stale_results(), 2);
        assert_eq!(client.transport().pending(), 1);
        assert_eq!(client.receive_command_result().unwrap(), Delivery::Shutdown);
    }

    #[test]
    fn test_should_stop_true_on_dead_channel() {
        let hub = MemoryHub::new();
        let client = Client::connect(hub.endpoint(), Role::LogsCollector).unwrap();
        hub.sever();
        assert!(client.should_stop());
    }

    #[test]
    fn test_receive_skips_other_receivers_and_kinds() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::SecondStage).unwrap();

        coordinator_says(&coordinator, Roles::THIRD_STAGE, Payload::WorkItem(WorkItem::new(1)));
        coordinator_says(&coordinator, Roles::SECOND_STAGE, Payload::Log(LogRecord::new("noise")));
        coordinator_says(&coordinator, Roles::SECOND_STAGE, Payload::WorkItem(WorkItem::new(2)));

        assert_eq!(client.receive_item().unwrap(), Delivery::Payload(WorkItem::new(2)));
    }

    #[test]
    fn test_receive_reports_shutdown() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::LogsCollector).unwrap();

        coordinator_says(&coordinator, Roles::ANY_CLIENT, Payload::Shutdown);
        assert_eq!(client.receive_log().unwrap(), Delivery::Shutdown);
    }

    #[test]
    fn test_receive_short_datagram_is_fatal() {
        let hub = MemoryHub::new();
        let other = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::SecondStage).unwrap();
        // Drain own announce first
        let mut buf = [0u8; ENVELOPE_SIZE];
        client.transport().try_recv(&mut buf).unwrap();

        other.send(&[1, 2, 3]).unwrap();
        let err = client.receive_item().unwrap_err();
        assert!(matches!(err, ChannelError::ShortRead { len: 3, .. }));
    }

    #[test]
    fn test_receive_times_out() {
        let hub = MemoryHub::new();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();
        client.set_receive_timeout(Some(Duration::from_millis(20))).unwrap();

        let err = client.receive_command_result().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_send_addresses_coordinator() {
        let hub = MemoryHub::new();
        let observer = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();
        client.send(Payload::Command(Command::disable(Roles::FIRST_STAGE))).unwrap();

        let mut buf = [0u8; ENVELOPE_SIZE];
        observer.try_recv(&mut buf).unwrap();
        observer.try_recv(&mut buf).unwrap();
        let envelope = Envelope::decode(&buf).unwrap();
        assert_eq!(envelope.receivers, Roles::COORDINATOR);
        assert_eq!(envelope.kind(), Kind::Command);
    }

    #[test]
    fn test_stop_if_gone() {
        let gone: Result<(), ChannelError> =
            Err(ChannelError::io("recv", std::io::Error::from(std::io::ErrorKind::ConnectionReset)));
        assert_eq!(stop_if_gone(gone).unwrap(), None);

        let fatal: Result<(), ChannelError> = Err(ChannelError::ShortRead { op: "recv", len: 1 });
        assert!(stop_if_gone(fatal).is_err());
    }
}
