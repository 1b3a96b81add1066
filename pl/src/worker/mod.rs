//! Stage workers and the logs collector
//!
//! Each runtime loop is generic over its capabilities so the stand-ins in
//! [`standins`] can be swapped for real inspection or processing code.

mod config;
mod runtime;
mod standins;
mod traits;

pub use config::WorkerConfig;
pub use runtime::{run_first_stage, run_logs_collector, run_second_stage, run_third_stage};
pub use standins::{Pacer, ParityCheck, QualityCheck, RandomSource, Sharpen, has_odd_parity, passes_quality};
pub use traits::{Inspect, ItemSource, Transform};
