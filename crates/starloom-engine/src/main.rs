//! Starloom engine binary.
//!
//! Loads the base resources and enabled plugins, optionally a saved game,
//! and runs a data-driven test when asked to.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration from `<config>/starloom.yaml`
//! 3. Initialize structured logging (tracing)
//! 4. Discover content sources and load them, parsing files in parallel
//! 5. Load the saved game, if one was given
//! 6. Run the test, if one was given
//!
//! # Exit Codes
//!
//! - `0` normal exit
//! - `1` the engine could not start: bad arguments, config, content or save
//! - `2` a test ran and failed

mod cli;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use starloom_core::EngineConfig;
use starloom_player::{PlayerInfo, TestReport, TestRunner};
use starloom_universe::UniverseObjects;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, USAGE};
use crate::error::EngineError;

/// Exit code for a failed test.
const TEST_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            error!(%error, "engine failed to start");
            eprintln!("starloom: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, EngineError> {
    // 1. Command line.
    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    // 2. Configuration.
    let config_dir = args.config.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut config = EngineConfig::load_dir(&config_dir)?;
    if let Some(resources) = &args.resources {
        config.resources.clone_from(resources);
    }
    config.date_format.set_global();

    // 3. Logging.
    init_logging(&config, args.debug);
    info!(
        config = %config_dir.display(),
        resources = %config.resources.display(),
        plugins = config.plugins.len(),
        "starloom starting"
    );

    // 4. Content.
    let sources = starloom_core::sources::discover(&config, &config_dir)?;
    let mut universe = UniverseObjects::new();
    let warnings = universe.load_sources(&sources).await?;
    info!(
        systems = universe.systems.len(),
        planets = universe.planets.len(),
        missions = universe.missions.len(),
        events = universe.events.len(),
        warnings = warnings.len(),
        "universe loaded"
    );

    let seed = seed(&config);

    // 5. Saved game.
    if let Some(path) = &args.load {
        let player = PlayerInfo::load(path, &mut universe, seed)?;
        info!(
            pilot = %player.name(),
            date = %player.today(),
            credits = player.account().credits(),
            missions = player.missions().len(),
            "pilot ready"
        );
    }

    // 6. Test.
    if let Some(name) = &args.test {
        return Ok(run_test(name, &mut universe, seed));
    }

    info!("nothing left to do");
    Ok(ExitCode::SUCCESS)
}

fn run_test(name: &str, universe: &mut UniverseObjects, seed: u64) -> ExitCode {
    let mut runner = TestRunner::new(universe, seed);
    match runner.run(name) {
        Ok(TestReport::Passed { steps }) => {
            info!(test = name, steps, "test passed");
            ExitCode::SUCCESS
        }
        Ok(TestReport::NotRun(status)) => {
            warn!(test = name, %status, "test not run");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(test = name, %error, "test failed");
            eprintln!("test \"{name}\" failed: {error}");
            ExitCode::from(TEST_FAILED)
        }
    }
}

/// The configured seed, or one from the clock when the config says zero.
fn seed(config: &EngineConfig) -> u64 {
    if config.seed != 0 {
        return config.seed;
    }
    let now = chrono::Utc::now();
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());
    nanos.unsigned_abs()
}

/// `RUST_LOG` wins; otherwise the configured level, or `debug` with
/// `--debug`.
fn init_logging(config: &EngineConfig, debug: bool) {
    let fallback = if debug { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }
}
