use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use bridge_app::config::BridgeConfig;
use bridge_app::fatal::abort_group;
use bridge_app::logging::init_logging;
use bridge_app::report::{ConsoleObserver, render_rehearsal, render_summary, write_json};
use bridge_core::game::{GreedyPolicy, LocalRound};
use bridge_table::play_session_observed;

/// One seat at a four-player bridge table held in POSIX shared memory.
#[derive(Debug, Parser)]
#[command(
    name = "shm-bridge",
    author,
    version,
    about = "Play one seat of a shared-memory bridge table"
)]
struct Cli {
    /// Path to an optional YAML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the shared-memory segment name.
    #[arg(long, value_name = "NAME")]
    segment: Option<String>,

    /// Override the creation semaphore name.
    #[arg(long, value_name = "NAME")]
    semaphore: Option<String>,

    /// Seed for the deal (only used by the process that creates the table).
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Number of shuffle passes over the deck.
    #[arg(long, value_name = "COUNT")]
    shuffle_passes: Option<usize>,

    /// Tracing level (trace, debug, info, warn, error); RUST_LOG wins.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Write the session report as JSON.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Play all four seats in this process without shared memory.
    #[arg(long)]
    rehearse: bool,

    /// On fatal errors exit with status 1 without killing the process group.
    #[arg(long)]
    no_group_kill: bool,
}

fn main() {
    let cli = Cli::parse();
    let kill_group = !cli.no_group_kill;
    if let Err(err) = run(cli) {
        abort_group(&err, kill_group);
    }
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match cli.config.as_ref() {
        Some(path) => BridgeConfig::from_path(path)?,
        None => BridgeConfig::default(),
    };

    if let Some(segment) = cli.segment.clone() {
        config.table.segment = segment;
    }
    if let Some(semaphore) = cli.semaphore.clone() {
        config.table.semaphore = semaphore;
    }
    if let Some(seed) = cli.seed {
        config.deal.seed = Some(seed);
    }
    if let Some(passes) = cli.shuffle_passes {
        config.deal.shuffle_passes = passes;
    }
    if let Some(level) = cli.log_level.clone() {
        config.logging.tracing_level = level;
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    if let Some(file) = cli.log_file.clone() {
        config.logging.file = Some(file);
    }

    config.validate().context("validating configuration")?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let _logging_guard = init_logging(&config.logging)?;

    let result = if cli.rehearse {
        rehearse(&config)
    } else {
        sit_down(&config, &cli)
    };
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "fatal error");
    }
    result
}

fn rehearse(config: &BridgeConfig) -> Result<()> {
    let deck = config.deal_options().deck();
    let mut round = LocalRound::deal(&deck);
    round
        .play_out(&mut GreedyPolicy)
        .context("rehearsing the deal")?;
    print!("{}", render_rehearsal(&round));
    Ok(())
}

fn sit_down(config: &BridgeConfig, cli: &Cli) -> Result<()> {
    let names = config.names().context("resolving table names")?;
    info!(segment = %names.segment, semaphore = %names.semaphore, "joining table");

    let mut console = ConsoleObserver::new(std::io::stdout());
    let report = play_session_observed(
        &names,
        &config.deal_options(),
        &mut GreedyPolicy,
        &mut console,
    )
    .with_context(|| format!("playing at table {}", names.segment))?;
    console.finish().context("writing to stdout")?;
    print!("{}", render_summary(&report));

    if let Some(path) = cli.report.as_ref() {
        write_json(&report, path)?;
        info!(path = %path.display(), "wrote session report");
    }
    Ok(())
}
