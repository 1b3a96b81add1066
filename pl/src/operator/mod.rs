//! Operator console - sends disable commands to the coordinator

mod command;
mod config;
mod session;

pub use command::send_command;
pub use config::OperatorConfig;
pub use session::{OperatorError, Prompt, ReadlinePrompt, ScriptedPrompt, menu_target, run_operator};
