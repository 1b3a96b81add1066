//! Interactive operator console

use std::collections::VecDeque;
use std::ops::RangeInclusive;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use thiserror::Error;
use tracing::{debug, info};

use super::command::send_command;
use crate::client::{Client, Delivery, Outcome};
use crate::events::Emitter;
use crate::net::Transport;
use crate::wire::{CommandResult, Roles};

const COMMAND_MENU: &str = "Enter command:\n> 1. Disable client\n> 2. Exit\n\n> ";

const ROLE_MENU: &str = "Enter client type:\n\
    > 1. First stage workers\n\
    > 2. Second stage workers\n\
    > 3. Third stage workers\n\
    > 4. Logs collectors\n\
    > 5. Operators\n\
    \n> ";

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("no connection to the coordinator")]
    NoConnection,

    #[error("failed to read operator input: {0}")]
    Readline(#[from] ReadlineError),
}

/// Source of menu choices
pub trait Prompt {
    /// Ask until the answer is a number inside `range`; `None` means the user left
    fn choose(&mut self, menu: &str, range: RangeInclusive<u32>) -> Result<Option<u32>, ReadlineError>;
}

/// Terminal prompt backed by rustyline
pub struct ReadlinePrompt {
    editor: DefaultEditor,
}

impl ReadlinePrompt {
    pub fn new() -> Result<Self, ReadlineError> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Prompt for ReadlinePrompt {
    fn choose(&mut self, menu: &str, range: RangeInclusive<u32>) -> Result<Option<u32>, ReadlineError> {
        let mut prompt = menu;
        loop {
            match self.editor.readline(prompt) {
                Ok(line) => {
                    let input = line.trim();
                    match input.parse::<u32>() {
                        Ok(value) if range.contains(&value) => {
                            let _ = self.editor.add_history_entry(input);
                            return Ok(Some(value));
                        }
                        _ => prompt = "Invalid input, please, try again\n> ",
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!();
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Menu answers fed from a list, for tests and scripted runs
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<u32>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = u32>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl Prompt for ScriptedPrompt {
    /// Out-of-range answers are skipped like invalid input; running out means leaving
    fn choose(&mut self, _menu: &str, range: RangeInclusive<u32>) -> Result<Option<u32>, ReadlineError> {
        while let Some(answer) = self.answers.pop_front() {
            if range.contains(&answer) {
                return Ok(Some(answer));
            }
        }
        Ok(None)
    }
}

/// Receiver mask for menu entry `n` (1..=5)
pub fn menu_target(n: u32) -> Roles {
    Roles::from_bits(1 << n)
}

/// Run the operator console until the user leaves or the coordinator stops it
pub fn run_operator<T: Transport>(
    client: &Client<T>,
    prompt: &mut dyn Prompt,
    emitter: &Emitter,
) -> Result<Outcome, OperatorError> {
    debug!("run_operator: called");
    let outcome = loop {
        if client.should_stop() {
            break Outcome::Stopped;
        }
        match prompt.choose(COMMAND_MENU, 1..=2)? {
            Some(1) => {}
            _ => break Outcome::Exited,
        }
        let Some(n) = prompt.choose(ROLE_MENU, 1..=5)? else {
            break Outcome::Exited;
        };

        let target = menu_target(n);
        emitter.command_sent(target);
        let result = match send_command(client, target) {
            Delivery::Payload(result) => result,
            Delivery::Shutdown => break Outcome::Stopped,
        };
        emitter.command_answered(target, result);
        if result == CommandResult::NoConnection {
            emitter.stopping("no connection to the coordinator");
            return Err(OperatorError::NoConnection);
        }
    };

    match outcome {
        Outcome::Stopped => emitter.stopping("received shutdown signal from the coordinator"),
        Outcome::Exited => emitter.stopping("exit requested"),
    }
    info!(?outcome, "run_operator: finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, RecordingSink};
    use crate::net::{MemoryHub, Transport};
    use crate::wire::{Envelope, Payload, Role};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_menu_targets_use_shifted_bits() {
        assert_eq!(menu_target(1), Roles::FIRST_STAGE);
        assert_eq!(menu_target(4), Roles::LOGS_COLLECTOR);
        assert_eq!(menu_target(5), Roles::OPERATOR);
    }

    #[test]
    fn test_scripted_prompt_skips_invalid_answers() {
        let mut prompt = ScriptedPrompt::new([7, 0, 2]);
        assert_eq!(prompt.choose(COMMAND_MENU, 1..=2).unwrap(), Some(2));
        assert_eq!(prompt.choose(COMMAND_MENU, 1..=2).unwrap(), None);
    }

    #[test]
    fn test_exit_choice_ends_session() {
        let hub = MemoryHub::new();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();
        let sink = Arc::new(RecordingSink::new());

        let mut prompt = ScriptedPrompt::new([2]);
        let outcome = run_operator(&client, &mut prompt, &Emitter::new(sink.clone(), Role::Operator)).unwrap();
        assert_eq!(outcome, Outcome::Exited);
        assert_eq!(sink.count(|e| matches!(e, Event::CommandSent { .. })), 0);
    }

    #[test]
    fn test_pending_shutdown_stops_session() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();

        let shutdown = Envelope::new(Role::Coordinator, Roles::OPERATOR, Payload::Shutdown);
        coordinator.send_envelope(&shutdown).unwrap();

        let mut prompt = ScriptedPrompt::new([1, 1]);
        let outcome = run_operator(&client, &mut prompt, &Emitter::null(Role::Operator)).unwrap();
        assert_eq!(outcome, Outcome::Stopped);
    }

    #[test]
    fn test_shutdown_behind_stale_result_stops_session() {
        let hub = MemoryHub::new();
        let coordinator = hub.endpoint();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();

        let stale = Envelope::new(
            Role::Coordinator,
            Roles::OPERATOR,
            Payload::CommandResult(CommandResult::InvalidArguments),
        );
        coordinator.send_envelope(&stale).unwrap();
        let shutdown = Envelope::new(Role::Coordinator, Roles::ANY_CLIENT, Payload::Shutdown);
        coordinator.send_envelope(&shutdown).unwrap();

        let mut prompt = ScriptedPrompt::new([1, 1]);
        let outcome = run_operator(&client, &mut prompt, &Emitter::null(Role::Operator)).unwrap();
        assert_eq!(outcome, Outcome::Stopped);
    }

    #[test]
    fn test_missing_coordinator_is_a_failure() {
        let hub = MemoryHub::new();
        let client = Client::connect(hub.endpoint(), Role::Operator).unwrap();
        client.set_receive_timeout(Some(Duration::from_millis(20))).unwrap();
        let sink = Arc::new(RecordingSink::new());

        let mut prompt = ScriptedPrompt::new([1, 3, 1, 3]);
        let err = run_operator(&client, &mut prompt, &Emitter::new(sink.clone(), Role::Operator)).unwrap_err();
        assert!(matches!(err, OperatorError::NoConnection));
        assert_eq!(sink.count(|e| matches!(e, Event::CommandSent { .. })), 1);
    }
}
