//! Bounded log queue between the poller and the fan-out thread
//!
//! A fixed-capacity FIFO guarded by a mutex, with a condition variable the
//! consumer waits on while the queue is empty. Producers never block: a full
//! queue hands the record back so the caller can report the drop.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::wire::LogRecord;

/// Default number of slots
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Returned by [`LogQueue::try_enqueue`] when every slot is taken
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("log queue full, record dropped")]
pub struct QueueFull(pub LogRecord);

#[derive(Debug)]
struct State {
    slots: VecDeque<LogRecord>,
    closed: bool,
}

#[derive(Debug)]
pub struct LogQueue {
    state: Mutex<State>,
    not_empty: Condvar,
    capacity: usize,
}

impl Default for LogQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl LogQueue {
    /// Create a queue with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!(capacity, "LogQueue::new: called");
        Self {
            state: Mutex::new(State {
                slots: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    fn lock_or_recover(&self) -> MutexGuard<'_, State> {
        // A panicking holder cannot leave the ring half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record without blocking
    pub fn try_enqueue(&self, record: LogRecord) -> Result<(), QueueFull> {
        let mut state = self.lock_or_recover();
        if state.slots.len() >= self.capacity {
            return Err(QueueFull(record));
        }
        state.slots.push_back(record);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the oldest record, waiting while the queue is empty
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn dequeue(&self) -> Option<LogRecord> {
        let mut state = self.lock_or_recover();
        loop {
            if let Some(record) = state.slots.pop_front() {
                return Some(record);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<LogRecord> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_or_recover();
        loop {
            if let Some(record) = state.slots.pop_front() {
                return Some(record);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if state.closed || remaining.is_zero() {
                return None;
            }
            let (next, _) = self
                .not_empty
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
    }

    /// Wake every waiting consumer; records already queued can still be drained
    pub fn close(&self) {
        debug!("LogQueue::close: called");
        self.lock_or_recover().closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock_or_recover().closed
    }

    pub fn len(&self) -> usize {
        self.lock_or_recover().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn record(text: &str) -> LogRecord {
        LogRecord::new(text)
    }

    #[test]
    fn test_fifo_order() {
        let queue = LogQueue::new(4);
        for text in ["a", "b", "c"] {
            queue.try_enqueue(record(text)).unwrap();
        }
        assert_eq!(queue.dequeue().unwrap().as_str(), "a");
        assert_eq!(queue.dequeue().unwrap().as_str(), "b");
        assert_eq!(queue.dequeue().unwrap().as_str(), "c");
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let queue = LogQueue::new(2);
        queue.try_enqueue(record("1")).unwrap();
        queue.try_enqueue(record("2")).unwrap();

        let err = queue.try_enqueue(record("3")).unwrap_err();
        assert_eq!(err.0.as_str(), "3");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_default_capacity() {
        let queue = LogQueue::default();
        assert_eq!(queue.capacity(), DEFAULT_QUEUE_CAPACITY);
        for i in 0..DEFAULT_QUEUE_CAPACITY {
            queue.try_enqueue(record(&i.to_string())).unwrap();
        }
        assert!(queue.try_enqueue(record("overflow")).is_err());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(LogQueue::new(0).capacity(), 1);
    }

    #[test]
    fn test_dequeue_blocks_until_enqueue() {
        let queue = Arc::new(LogQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!consumer.is_finished());

        queue.try_enqueue(record("late")).unwrap();
        assert_eq!(consumer.join().unwrap().unwrap().as_str(), "late");
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let queue = Arc::new(LogQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_closed_queue_drains_before_ending() {
        let queue = LogQueue::new(4);
        queue.try_enqueue(record("left")).unwrap();
        queue.close();
        assert_eq!(queue.dequeue().unwrap().as_str(), "left");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_dequeue_timeout_on_empty() {
        let queue = LogQueue::new(4);
        let started = Instant::now();
        assert!(queue.dequeue_timeout(Duration::from_millis(20)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_producer_consumer_no_loss_or_duplicates() {
        let queue = Arc::new(LogQueue::new(DEFAULT_QUEUE_CAPACITY));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(record) = queue.dequeue() {
                    seen.push(record.as_str().parse::<u32>().unwrap());
                }
                seen
            })
        };

        for i in 0..500u32 {
            let mut pending = record(&i.to_string());
            loop {
                match queue.try_enqueue(pending) {
                    Ok(()) => break,
                    Err(QueueFull(back)) => {
                        pending = back;
                        thread::yield_now();
                    }
                }
            }
        }
        queue.close();

        let seen = consumer.join().unwrap();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }
}
