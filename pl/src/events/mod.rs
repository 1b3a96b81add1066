//! Participant narration
//!
//! Every participant reports what it is doing through an [`Emitter`] bound to
//! its role. The binary renders events with [`ConsoleSink`]; tests capture
//! them with [`RecordingSink`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pinline::events::{ConsoleSink, Emitter};
//! use pinline::wire::{Role, WorkItem};
//!
//! let emitter = Emitter::new(Arc::new(ConsoleSink), Role::FirstStage);
//! emitter.item_accepted(WorkItem::new(42));
//! ```

mod console;
mod emitter;
mod types;

pub use console::{ConsoleSink, render};
pub use emitter::{Emitter, EventSink, NullSink, RecordingSink};
pub use types::{Event, Severity};
