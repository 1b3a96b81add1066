//! Coordinator - routes work items between stages and fans out audit logs
//!
//! The coordinator is the only authoritative sender on the channel. It:
//! - Forwards work items from stage 1 to stage 2 and from stage 2 to stage 3
//! - Records every event it sees as an audit record for the logs collectors
//! - Answers operator commands by disabling whole client roles
//! - Sends one final shutdown signal to every client when it stops

mod config;
mod context;
mod dispatch;
mod lifecycle;
mod queue;

pub use config::CoordinatorConfig;
pub use context::{CoordinatorContext, StopToken};
pub use dispatch::{Dispatcher, PollStatus, validate_target};
pub use lifecycle::{Coordinator, CoordinatorError, StopHandle};
pub use queue::{DEFAULT_QUEUE_CAPACITY, LogQueue, QueueFull};
