//! Self-play binary for the werewolf decision engine.
//!
//! Runs batches of rule-based matches, archives every finished match and
//! lets the calibrator refit the weak-evidence weights in the background.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration (first argument, `WEREWOLF_CONFIG`, or
//!    `werewolf-config.yaml` in the working directory) and apply
//!    environment overrides
//! 3. Open the match archive: `PostgreSQL` when `database.url` is set,
//!    in-memory otherwise
//! 4. Spawn the calibrator task
//! 5. Play the requested matches
//! 6. Print the win-rate summary

mod driver;
mod error;
mod self_play;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use werewolf_agents::DecisionMakers;
use werewolf_calibrator::{Calibrator, InMemoryArchive, MatchArchive};
use werewolf_core::GameConfig;
use werewolf_db::{PgArchive, PoolSettings, PostgresPool};
use werewolf_inference::ParamsRegistry;
use werewolf_types::Winner;

use crate::driver::{Driver, Tally};
use crate::error::EngineError;
use crate::self_play::SelfPlaySource;

/// Config file looked up in the working directory when no path is given.
const DEFAULT_CONFIG_FILE: &str = "werewolf-config.yaml";

/// Capacity of the channel feeding finished matches to the calibrator.
const RECORD_CHANNEL_CAPACITY: usize = 256;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "werewolf-engine", version, about = "Rule-based werewolf self-play with online calibration")]
struct Args {
    /// YAML config file. Falls back to `WEREWOLF_CONFIG`.
    config: Option<PathBuf>,

    /// Matches to play.
    #[arg(long, default_value_t = 50)]
    matches: u32,

    /// Matches running at the same time.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Seed for the role shuffles.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the archive or the scheduler fails.
/// Individual match failures are counted, not returned.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    info!("werewolf-engine starting");

    let config = load_config(args.config.as_deref())?;
    info!(
        players = config.game.roles.len(),
        wolves = config.game.wolf_count(),
        phase_timeout_ms = config.game.phase_timeout_ms,
        max_rounds = config.game.max_rounds,
        archive = if config.database.url.is_some() { "postgres" } else { "memory" },
        "Configuration loaded"
    );

    let archive = open_archive(&config).await?;
    let registry = Arc::new(ParamsRegistry::default());
    let calibrator = Calibrator::new(config.calibrator.clone(), archive, Arc::clone(&registry))
        .map_err(EngineError::from)?;
    let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
    let calibrator_task = tokio::spawn(calibrator.run(rx));
    info!("Calibrator started");

    let makers = DecisionMakers::new(config.decisions.clone()).map_err(EngineError::from)?;
    let driver = Driver::new(
        config,
        Arc::new(SelfPlaySource::new(makers)),
        Arc::clone(&registry),
        tx,
        args.concurrency,
    );
    info!(matches = args.matches, concurrency = args.concurrency, seed = args.seed, "Playing");
    let mut tally = driver.play(args.matches, args.seed).await?;

    // Closing the channel lets the calibrator finish its backlog and exit.
    drop(driver);
    if let Err(err) = calibrator_task.await {
        warn!(error = %err, "calibrator task ended abnormally");
    }
    tally.params_version = registry.current().version;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tally)?);
    } else {
        print_summary(&tally);
    }
    info!(params_version = tally.params_version, "werewolf-engine shutdown complete");
    Ok(())
}

/// `RUST_LOG` filtering (default `info`); JSON lines when
/// `WEREWOLF_LOG_JSON=1`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("WEREWOLF_LOG_JSON").is_ok_and(|v| v == "1");
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn load_config(arg: Option<&Path>) -> Result<GameConfig, EngineError> {
    let path = arg
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("WEREWOLF_CONFIG").map(PathBuf::from))
        .or_else(|| {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            fallback.exists().then_some(fallback)
        });
    let mut config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading config file");
            GameConfig::from_file(&path)?
        }
        None => {
            info!("Config file not found, using defaults");
            GameConfig::default()
        }
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

async fn open_archive(config: &GameConfig) -> Result<Arc<dyn MatchArchive>, EngineError> {
    let Some(url) = config.database.url.as_deref() else {
        return Ok(Arc::new(InMemoryArchive::new()));
    };
    let pool = PostgresPool::open(&PoolSettings::new(url, config.database.max_connections)).await?;
    Ok(Arc::new(PgArchive::new(pool)))
}

fn print_summary(tally: &Tally) {
    println!("matches completed : {}", tally.completed());
    println!("matches failed    : {}", tally.failed);
    println!("good wins         : {} ({:.1}%)", tally.good, tally.rate(Winner::Good) * 100.0);
    println!("wolf wins         : {} ({:.1}%)", tally.wolves, tally.rate(Winner::Wolves) * 100.0);
    println!("draws             : {} ({:.1}%)", tally.draws, tally.rate(Winner::Draw) * 100.0);
    println!("mean rounds       : {:.2}", tally.mean_rounds());
    println!("params version    : {}", tally.params_version);
}
