//! Main loops of the stage workers and the logs collector
//!
//! Every loop checks [`Client::should_stop`] at the top of each cycle and
//! again before sending, so a shutdown issued while an item was being
//! processed stops the worker without forwarding that item.

use tracing::{debug, info};

use super::traits::{Inspect, ItemSource, Transform};
use crate::client::{Client, Delivery, Outcome, stop_if_gone};
use crate::events::Emitter;
use crate::net::{ChannelError, Transport};

fn delivered<T>(result: Result<Delivery<T>, ChannelError>) -> Result<Option<T>, ChannelError> {
    match stop_if_gone(result)? {
        Some(Delivery::Payload(value)) => Ok(Some(value)),
        Some(Delivery::Shutdown) | None => Ok(None),
    }
}

fn stopped(emitter: &Emitter) -> Result<Outcome, ChannelError> {
    emitter.stopping("received shutdown signal from the coordinator");
    info!(role = %emitter.role(), "worker stopping");
    Ok(Outcome::Stopped)
}

/// Draw items, keep those that pass `check`, and send them to the coordinator
pub fn run_first_stage<T: Transport>(
    client: &Client<T>,
    source: &mut dyn ItemSource,
    check: &mut dyn Inspect,
    emitter: &Emitter,
) -> Result<Outcome, ChannelError> {
    debug!("run_first_stage: called");
    while !client.should_stop() {
        let item = source.next_item();
        emitter.item_received(item);
        if !check.inspect(&item) {
            emitter.item_rejected(item);
            continue;
        }
        emitter.item_accepted(item);

        if client.should_stop() {
            break;
        }
        if stop_if_gone(client.send_item(item))?.is_none() {
            break;
        }
        emitter.item_sent(item);
    }
    stopped(emitter)
}

/// Receive stage-1 items, transform them, and send them back for stage 3
pub fn run_second_stage<T: Transport>(
    client: &Client<T>,
    step: &mut dyn Transform,
    emitter: &Emitter,
) -> Result<Outcome, ChannelError> {
    debug!("run_second_stage: called");
    while !client.should_stop() {
        let Some(item) = delivered(client.receive_item())? else {
            break;
        };
        emitter.item_received(item);
        let item = step.transform(item);
        emitter.item_accepted(item);

        if client.should_stop() {
            break;
        }
        if stop_if_gone(client.send_item(item))?.is_none() {
            break;
        }
        emitter.item_sent(item);
    }
    stopped(emitter)
}

/// Receive stage-2 items and report the final verdict
pub fn run_third_stage<T: Transport>(
    client: &Client<T>,
    check: &mut dyn Inspect,
    emitter: &Emitter,
) -> Result<Outcome, ChannelError> {
    debug!("run_third_stage: called");
    while !client.should_stop() {
        let Some(item) = delivered(client.receive_item())? else {
            break;
        };
        emitter.item_received(item);
        if check.inspect(&item) {
            emitter.item_accepted(item);
        } else {
            emitter.item_rejected(item);
        }
    }
    stopped(emitter)
}

/// Print every audit record the coordinator fans out
pub fn run_logs_collector<T: Transport>(client: &Client<T>, emitter: &Emitter) -> Result<Outcome, ChannelError> {
    debug!("run_logs_collector: called");
    while !client.should_stop() {
        let Some(record) = delivered(client.receive_log())? else {
            break;
        };
        emitter.log_received(record.as_str());
    }
    stopped(emitter)
}
