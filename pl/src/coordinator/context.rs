//! Shared coordinator state
//!
//! Everything the poller and the fan-out thread share lives in one
//! [`CoordinatorContext`] behind an `Arc`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use super::config::CoordinatorConfig;
use super::queue::{LogQueue, QueueFull};
use crate::events::{Emitter, Severity};
use crate::net::{ChannelError, Transport};
use crate::wire::{Envelope, LogRecord, Payload, Role, Roles};

/// Cooperative cancellation flag checked at every cycle boundary
///
/// May additionally watch a process-wide flag set from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
    signal: Option<&'static AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also reports cancelled once `signal` is set
    pub fn watching(signal: &'static AtomicBool) -> Self {
        Self {
            flag: Arc::default(),
            signal: Some(signal),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.signal.is_some_and(|signal| signal.load(Ordering::SeqCst))
    }
}

pub struct CoordinatorContext {
    transport: Arc<dyn Transport>,
    queue: LogQueue,
    stop: StopToken,
    emitter: Emitter,
    config: CoordinatorConfig,
    disposed: AtomicBool,
}

impl fmt::Debug for CoordinatorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorContext")
            .field("queue", &self.queue)
            .field("stop", &self.stop)
            .field("config", &self.config)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl CoordinatorContext {
    pub fn new(transport: Arc<dyn Transport>, config: CoordinatorConfig, stop: StopToken, emitter: Emitter) -> Self {
        debug!(?config, "CoordinatorContext::new: called");
        Self {
            transport,
            queue: LogQueue::new(config.queue_capacity),
            stop,
            emitter,
            config,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn queue(&self) -> &LogQueue {
        &self.queue
    }

    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Broadcast `payload` from the coordinator to `receivers`
    pub fn broadcast(&self, receivers: Roles, payload: Payload) -> Result<(), ChannelError> {
        let envelope = Envelope::new(Role::Coordinator, receivers, payload);
        debug!(%receivers, kind = %envelope.kind(), "CoordinatorContext::broadcast: called");
        self.transport.send_envelope(&envelope)
    }

    /// Emit an audit record to tracing, the narration sink and the log queue
    ///
    /// A full queue drops the record with a warning.
    pub fn record(&self, severity: Severity, text: impl Into<String>) {
        let text = text.into();
        match severity {
            Severity::Info => info!(audit = %text, "CoordinatorContext::record"),
            Severity::Warning => warn!(audit = %text, "CoordinatorContext::record"),
            Severity::Error => error!(audit = %text, "CoordinatorContext::record"),
        }
        self.emitter.audit(severity, &text);

        if let Err(QueueFull(record)) = self.queue.try_enqueue(LogRecord::new(text)) {
            warn!(dropped = %record, "CoordinatorContext::record: log queue full");
            self.emitter.record_dropped(record.as_str());
        }
    }

    /// Start the cancellation sequence; only the first caller runs it
    ///
    /// Returns `true` for the caller that performed the sequence.
    pub fn request_stop(&self) -> bool {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("CoordinatorContext::request_stop: already stopping");
            return false;
        }
        info!("CoordinatorContext::request_stop: stopping coordinator threads");
        self.stop.cancel();
        self.queue.close();
        true
    }

    pub fn is_stopping(&self) -> bool {
        self.disposed.load(Ordering::SeqCst) || self.stop.is_cancelled()
    }
}
