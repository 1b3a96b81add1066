//! pinline - broadcast task pipeline
//!
//! CLI entry point: runs one participant role on the given broadcast port.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use pinline::cli::{Cli, RoleCommand};
use pinline::client::{Client, Outcome};
use pinline::config::Config;
use pinline::coordinator::{Coordinator, StopToken};
use pinline::events::{ConsoleSink, Emitter};
use pinline::net::{BroadcastSocket, Transport};
use pinline::operator::{ReadlinePrompt, run_operator};
use pinline::signals;
use pinline::wire::Role;
use pinline::worker::{
    Pacer, ParityCheck, QualityCheck, RandomSource, Sharpen, run_first_stage, run_logs_collector, run_second_stage,
    run_third_stage,
};

fn setup_logging(role: Role, level: &str) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pinline")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // One file per role so participants on the same host don't clobber each other
    let level: tracing::Level = level.parse().context(format!("Invalid log level: {level}"))?;
    let log_file =
        fs::File::create(log_dir.join(format!("{}.log", role.slug()))).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!(%role, %level, "Logging initialized");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let role = cli.command.role();
    let level = cli.log_level.clone().or_else(|| config.log_level.clone());
    setup_logging(role, level.as_deref().unwrap_or("info")).context("Failed to setup logging")?;

    let addr = config.network.endpoint(cli.command.port());
    let socket = BroadcastSocket::bind_addr(addr).context(format!("Failed to bind broadcast socket to {addr}"))?;
    info!(%role, %addr, "pinline starting");

    let emitter = Emitter::new(Arc::new(ConsoleSink::new()), role);
    let pacer = || Pacer::new(&config.worker);
    match cli.command {
        RoleCommand::Coordinator(_) => run_coordinator(socket, &config, emitter),
        RoleCommand::FirstStage(_) => with_client(socket, &emitter, |client| {
            let mut source = RandomSource::new(pacer());
            let mut check = ParityCheck::new(pacer());
            Ok(run_first_stage(client, &mut source, &mut check, &emitter)?)
        }),
        RoleCommand::SecondStage(_) => with_client(socket, &emitter, |client| {
            Ok(run_second_stage(client, &mut Sharpen::new(pacer()), &emitter)?)
        }),
        RoleCommand::ThirdStage(_) => with_client(socket, &emitter, |client| {
            Ok(run_third_stage(client, &mut QualityCheck::new(pacer()), &emitter)?)
        }),
        RoleCommand::LogsCollector(_) => with_client(socket, &emitter, |client| Ok(run_logs_collector(client, &emitter)?)),
        RoleCommand::Operator(_) => with_client(socket, &emitter, |client| {
            client
                .set_receive_timeout(Some(config.operator.reply_timeout()))
                .context("Failed to set reply timeout")?;
            let mut prompt = ReadlinePrompt::new().context("Failed to initialize readline")?;
            Ok(run_operator(client, &mut prompt, &emitter)?)
        }),
    }
}

fn run_coordinator(socket: BroadcastSocket, config: &Config, emitter: Emitter) -> Result<()> {
    signals::install().context("Failed to install signal handlers")?;

    let transport: Arc<dyn Transport> = Arc::new(socket);
    let stop = StopToken::watching(&signals::STOP_REQUESTED);
    let coordinator = Coordinator::new(transport, config.coordinator.clone(), stop, emitter);
    coordinator.run().context("Coordinator failed")?;
    Ok(())
}

/// Announce the emitter's role on `socket` and run `body` as that client
fn with_client<F>(socket: BroadcastSocket, emitter: &Emitter, body: F) -> Result<()>
where
    F: FnOnce(&Client<BroadcastSocket>) -> Result<Outcome>,
{
    let role = emitter.role();
    let client = Client::connect(socket, role).context("Failed to announce to the coordinator")?;
    emitter.bound(client.local_addr());

    let outcome = body(&client)?;
    info!(%role, ?outcome, "pinline finished");
    Ok(())
}
