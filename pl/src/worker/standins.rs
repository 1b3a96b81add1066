//! Stand-in capabilities so the pipeline runs end to end
//!
//! Each one sleeps for a random time inside the configured range to imitate
//! real processing, then applies a cheap deterministic rule.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::config::WorkerConfig;
use super::traits::{Inspect, ItemSource, Transform};
use crate::wire::WorkItem;

/// Random pause within a fixed range
#[derive(Debug)]
pub struct Pacer {
    min: Duration,
    max: Duration,
    rng: StdRng,
}

impl Pacer {
    pub fn new(config: &WorkerConfig) -> Self {
        let (min, max) = config.delay_range();
        Self {
            min,
            max,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Pacer that never sleeps, seeded for reproducible runs
    pub fn instant(seed: u64) -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick the next delay without sleeping
    pub fn next_delay(&mut self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let millis = self
            .rng
            .random_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(millis)
    }

    pub fn pause(&mut self) {
        let delay = self.next_delay();
        debug!(?delay, "Pacer::pause: called");
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// Random work item ids
#[derive(Debug)]
pub struct RandomSource {
    pacer: Pacer,
}

impl RandomSource {
    pub fn new(pacer: Pacer) -> Self {
        Self { pacer }
    }
}

impl ItemSource for RandomSource {
    fn next_item(&mut self) -> WorkItem {
        WorkItem::new(self.pacer.rng().random::<u32>())
    }
}

/// Stage-1 check: passes items whose id has an odd number of set bits
#[derive(Debug)]
pub struct ParityCheck {
    pacer: Pacer,
}

impl ParityCheck {
    pub fn new(pacer: Pacer) -> Self {
        Self { pacer }
    }
}

/// The stage-1 acceptance rule, without the delay
pub fn has_odd_parity(item: &WorkItem) -> bool {
    item.id.count_ones() % 2 == 1
}

impl Inspect for ParityCheck {
    fn inspect(&mut self, item: &WorkItem) -> bool {
        self.pacer.pause();
        has_odd_parity(item)
    }
}

/// Stage-2 processing: takes time, leaves the item unchanged
#[derive(Debug)]
pub struct Sharpen {
    pacer: Pacer,
}

impl Sharpen {
    pub fn new(pacer: Pacer) -> Self {
        Self { pacer }
    }
}

impl Transform for Sharpen {
    fn transform(&mut self, item: WorkItem) -> WorkItem {
        self.pacer.pause();
        item
    }
}

/// Stage-3 check: passes items whose id has a non-negative cosine
#[derive(Debug)]
pub struct QualityCheck {
    pacer: Pacer,
}

impl QualityCheck {
    pub fn new(pacer: Pacer) -> Self {
        Self { pacer }
    }
}

/// The stage-3 acceptance rule, without the delay
pub fn passes_quality(item: &WorkItem) -> bool {
    f64::from(item.id).cos() >= 0.0
}

impl Inspect for QualityCheck {
    fn inspect(&mut self, item: &WorkItem) -> bool {
        self.pacer.pause();
        passes_quality(item)
    }
}
