//! Coordinator threads and shutdown sequencing
//!
//! The coordinator runs two OS threads over one shared context:
//!
//! ```text
//!  poller:   recv ──▶ Dispatcher ──▶ forward items / reply commands
//!                          │
//!                          ▼
//!                      LogQueue
//!                          │
//!  fan-out:                └──▶ broadcast to logs collectors ──▶ pause
//! ```
//!
//! Either thread failing, a [`StopHandle::stop`] call or the stop token
//! (signal flag) ends both loops. After both threads are joined, exactly one
//! shutdown envelope goes to every client role.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::config::CoordinatorConfig;
use super::context::{CoordinatorContext, StopToken};
use super::dispatch::Dispatcher;
use crate::events::Emitter;
use crate::net::{ChannelError, Transport};
use crate::wire::{Payload, Roles};

/// Failures that make the coordinator exit with a failure status
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to configure coordinator socket: {0}")]
    Configure(#[source] ChannelError),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{name} thread panicked")]
    Panicked { name: &'static str },

    #[error("poller stopped: {0}")]
    Poller(#[source] ChannelError),

    #[error("log fan-out stopped: {0}")]
    FanOut(#[source] ChannelError),

    #[error("failed to send shutdown signal to clients: {0}")]
    Shutdown(#[source] ChannelError),
}

/// Cloneable handle that asks a running coordinator to stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    ctx: Arc<CoordinatorContext>,
}

impl StopHandle {
    /// Returns `true` for the call that actually started the shutdown
    pub fn stop(&self) -> bool {
        self.ctx.request_stop()
    }
}

#[derive(Debug)]
pub struct Coordinator {
    ctx: Arc<CoordinatorContext>,
}

impl Coordinator {
    pub fn new(transport: Arc<dyn Transport>, config: CoordinatorConfig, stop: StopToken, emitter: Emitter) -> Self {
        debug!("Coordinator::new: called");
        Self {
            ctx: Arc::new(CoordinatorContext::new(transport, config, stop, emitter)),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            ctx: Arc::clone(&self.ctx),
        }
    }

    pub fn context(&self) -> &Arc<CoordinatorContext> {
        &self.ctx
    }

    /// Run both threads until stopped, then notify every client
    pub fn run(self) -> Result<(), CoordinatorError> {
        let ctx = self.ctx;
        info!(addr = ?ctx.transport().local_addr(), "Coordinator::run: starting");
        ctx.emitter().bound(ctx.transport().local_addr());

        ctx.transport()
            .set_read_timeout(Some(ctx.config().poll_interval()))
            .map_err(|e| CoordinatorError::Configure(ChannelError::io("setsockopt(SO_RCVTIMEO)", e)))?;

        let result = run_threads(&ctx);

        info!("Coordinator::run: sending shutdown signal to all clients");
        let shutdown = ctx
            .broadcast(Roles::ANY_CLIENT, Payload::Shutdown)
            .map_err(CoordinatorError::Shutdown);
        if shutdown.is_ok() {
            ctx.emitter().shutdown_broadcast();
        }

        ctx.emitter().released();
        info!("Coordinator::run: released");
        result.and(shutdown)
    }
}

type Worker = JoinHandle<Result<(), ChannelError>>;

const POLLER: &str = "poller";
const FAN_OUT: &str = "log-fan-out";

fn spawn<F>(name: &'static str, ctx: &Arc<CoordinatorContext>, body: F) -> Result<Worker, CoordinatorError>
where
    F: FnOnce(Arc<CoordinatorContext>) -> Result<(), ChannelError> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(ctx))
        .map_err(|source| CoordinatorError::Spawn { name, source })
}

fn join(name: &'static str, handle: Worker, wrap: fn(ChannelError) -> CoordinatorError) -> Result<(), CoordinatorError> {
    let result = match handle.join() {
        Ok(result) => result.map_err(wrap),
        Err(_) => Err(CoordinatorError::Panicked { name }),
    };
    info!(thread = name, ok = result.is_ok(), "join: thread finished");
    result
}

fn run_threads(ctx: &Arc<CoordinatorContext>) -> Result<(), CoordinatorError> {
    let poller = spawn(POLLER, ctx, poll_loop).inspect_err(|_| {
        ctx.request_stop();
    })?;
    info!("run_threads: started polling thread");

    let fan_out = match spawn(FAN_OUT, ctx, fan_out_loop) {
        Ok(handle) => handle,
        Err(err) => {
            ctx.request_stop();
            // The spawn failure is reported; the poller's own result is not
            let _ = join(POLLER, poller, CoordinatorError::Poller);
            return Err(err);
        }
    };
    info!("run_threads: started log fan-out thread");

    let polled = join(POLLER, poller, CoordinatorError::Poller);
    // A panicking poller never reached its own stop request
    ctx.request_stop();
    let fanned = join(FAN_OUT, fan_out, CoordinatorError::FanOut);
    polled.and(fanned)
}

/// Dispatch until stopped; any non-transient error stops the coordinator
fn poll_loop(ctx: Arc<CoordinatorContext>) -> Result<(), ChannelError> {
    debug!("poll_loop: called");
    let dispatcher = Dispatcher::new(Arc::clone(&ctx));
    let result = loop {
        if ctx.is_stopping() {
            break Ok(());
        }
        match dispatcher.poll_once() {
            Ok(_) => {}
            Err(err) if err.is_transient() => {
                debug!(%err, "poll_loop: transient error");
            }
            Err(err) => {
                error!(%err, "poll_loop: could not poll clients");
                break Err(err);
            }
        }
    };
    ctx.request_stop();
    result
}

/// Drain the log queue towards the logs collectors at a fixed cadence
fn fan_out_loop(ctx: Arc<CoordinatorContext>) -> Result<(), ChannelError> {
    debug!("fan_out_loop: called");
    let cadence = ctx.config().poll_interval();
    let pause = ctx.config().fan_out_interval();
    let result = loop {
        if ctx.is_stopping() {
            break Ok(());
        }
        let Some(record) = ctx.queue().dequeue_timeout(cadence) else {
            continue;
        };
        if let Err(err) = ctx.broadcast(Roles::LOGS_COLLECTOR, Payload::Log(record)) {
            error!(%err, "fan_out_loop: could not send log");
            break Err(err);
        }
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    };
    if result.is_err() {
        ctx.request_stop();
    }
    let left = ctx.queue().len();
    if left > 0 {
        warn!(left, "fan_out_loop: undelivered log records");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, RecordingSink};
    use crate::net::{MemoryEndpoint, MemoryHub};
    use crate::wire::{ENVELOPE_SIZE, Envelope, Kind, Role};
    use std::time::Duration;

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            poll_interval_ms: 20,
            fan_out_interval_ms: 0,
            ..Default::default()
        }
    }

    fn coordinator(hub: &MemoryHub) -> (Coordinator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let coordinator = Coordinator::new(
            Arc::new(hub.endpoint()),
            fast_config(),
            StopToken::new(),
            Emitter::new(sink.clone(), Role::Coordinator),
        );
        (coordinator, sink)
    }

    fn shutdowns_seen(observer: &MemoryEndpoint) -> usize {
        let mut buf = [0u8; ENVELOPE_SIZE];
        let mut count = 0;
        while let Some(len) = observer.try_recv(&mut buf).unwrap() {
            let is_final_shutdown = Envelope::decode(&buf[..len]).is_ok_and(|envelope| {
                envelope.sender == Role::Coordinator
                    && envelope.kind() == Kind::Shutdown
                    && envelope.receivers == Roles::ANY_CLIENT
            });
            if is_final_shutdown {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn test_concurrent_stop_sends_one_shutdown() {
        let hub = MemoryHub::new();
        let observer = hub.endpoint();
        let (coordinator, sink) = coordinator(&hub);
        let handle = coordinator.stop_handle();

        let runner = thread::spawn(move || coordinator.run());
        thread::sleep(Duration::from_millis(50));

        let stoppers: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || handle.stop())
            })
            .collect();
        let started: usize = stoppers.into_iter().map(|h| usize::from(h.join().unwrap())).sum();

        runner.join().unwrap().unwrap();
        assert_eq!(started, 1);
        assert_eq!(shutdowns_seen(&observer), 1);
        assert_eq!(sink.count(|event| matches!(event, Event::Released { .. })), 1);
        assert_eq!(sink.count(|event| matches!(event, Event::ShutdownBroadcast { .. })), 1);
    }

    #[test]
    fn test_stop_token_ends_run() {
        let hub = MemoryHub::new();
        let observer = hub.endpoint();
        let token = StopToken::new();
        let coordinator = Coordinator::new(
            Arc::new(hub.endpoint()),
            fast_config(),
            token.clone(),
            Emitter::null(Role::Coordinator),
        );

        let runner = thread::spawn(move || coordinator.run());
        thread::sleep(Duration::from_millis(30));
        token.cancel();

        runner.join().unwrap().unwrap();
        assert_eq!(shutdowns_seen(&observer), 1);
    }

    #[test]
    fn test_dead_channel_fails_run() {
        let hub = MemoryHub::new();
        let (coordinator, sink) = coordinator(&hub);

        let runner = thread::spawn(move || coordinator.run());
        thread::sleep(Duration::from_millis(30));
        hub.sever();

        let err = runner.join().unwrap().unwrap_err();
        assert!(matches!(err, CoordinatorError::Poller(_) | CoordinatorError::FanOut(_)));
        assert_eq!(sink.count(|event| matches!(event, Event::Released { .. })), 1);
    }

    #[test]
    fn test_audit_records_reach_logs_collector() {
        let hub = MemoryHub::new();
        let collector = hub.endpoint();
        collector.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let (coordinator, _) = coordinator(&hub);
        let handle = coordinator.stop_handle();
        let runner = thread::spawn(move || coordinator.run());

        let announce = Envelope::new(Role::ThirdStage, Roles::COORDINATOR, crate::wire::Payload::Announce);
        collector.send_envelope(&announce).unwrap();

        let mut buf = [0u8; ENVELOPE_SIZE];
        let record = loop {
            let (len, _) = collector.recv_from(&mut buf).unwrap();
            let envelope = Envelope::decode(&buf[..len]).unwrap();
            if envelope.sender == Role::Coordinator && envelope.kind() == Kind::Log {
                break envelope;
            }
        };
        handle.stop();
        runner.join().unwrap().unwrap();

        assert_eq!(record.receivers, Roles::LOGS_COLLECTOR);
        match record.payload {
            crate::wire::Payload::Log(text) => assert!(text.as_str().contains("third stage worker")),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
