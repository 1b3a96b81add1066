//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::wire::Role;

/// pinline - broadcast task pipeline
#[derive(Debug, Parser)]
#[command(
    name = "pinline",
    about = "Coordinator, stage workers and operator console for a UDP broadcast task pipeline",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/pinline/logs/<role>.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(short, long, global = true, help = "Log level: trace, debug, info, warn, error")]
    pub log_level: Option<String>,

    /// Role to run
    #[command(subcommand)]
    pub command: RoleCommand,
}

/// Port argument shared by every role
#[derive(Debug, Clone, Copy, clap::Args)]
pub struct PortArg {
    /// Broadcast port shared by all participants
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
}

/// Participant roles
#[derive(Debug, Subcommand)]
pub enum RoleCommand {
    /// Route work items and fan out audit logs
    Coordinator(PortArg),

    /// Produce work items and run the first check
    FirstStage(PortArg),

    /// Process items that passed the first stage
    SecondStage(PortArg),

    /// Run the final check
    ThirdStage(PortArg),

    /// Print the coordinator's audit records
    LogsCollector(PortArg),

    /// Interactive console for disabling client roles
    Operator(PortArg),
}

impl RoleCommand {
    pub fn role(&self) -> Role {
        match self {
            RoleCommand::Coordinator(_) => Role::Coordinator,
            RoleCommand::FirstStage(_) => Role::FirstStage,
            RoleCommand::SecondStage(_) => Role::SecondStage,
            RoleCommand::ThirdStage(_) => Role::ThirdStage,
            RoleCommand::LogsCollector(_) => Role::LogsCollector,
            RoleCommand::Operator(_) => Role::Operator,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            RoleCommand::Coordinator(arg)
            | RoleCommand::FirstStage(arg)
            | RoleCommand::SecondStage(arg)
            | RoleCommand::ThirdStage(arg)
            | RoleCommand::LogsCollector(arg)
            | RoleCommand::Operator(arg) => arg.port,
        }
    }
}
