//! Request/response over the broadcast channel

use tracing::{debug, warn};

use crate::client::{Client, Delivery};
use crate::net::Transport;
use crate::wire::{Command, CommandResult, Payload, Roles};

/// Ask the coordinator to disable every participant of `target`
///
/// Results left over from earlier exchanges are dropped before sending. Blocks
/// until the answer arrives or the client's receive timeout expires. Any send
/// or receive failure is reported as [`CommandResult::NoConnection`].
/// A shutdown addressed to the operator while waiting wins over the answer.
pub fn send_command<T: Transport>(client: &Client<T>, target: Roles) -> Delivery<CommandResult> {
    debug!(%target, "send_command: called");
    client.discard_stale_results();
    if let Err(err) = client.send(Payload::Command(Command::disable(target))) {
        warn!(%err, %target, "send_command: failed to send command");
        return Delivery::Payload(CommandResult::NoConnection);
    }

    match client.receive_command_result() {
        Ok(delivery) => delivery,
        Err(err) => {
            warn!(%err, %target, "send_command: no answer from the coordinator");
            Delivery::Payload(CommandResult::NoConnection)
        }
    }
}
