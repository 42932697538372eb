//! # cloudfuzz
//!
//! Provision a cloud of worker processes and fuzz it with randomized jobs.
//!
//! ## Commands
//!
//! - `run`: provision hosts, wait for the cloud, run trials, tear down
//! - `fuzz`: run trials against a cloud that is already up
//! - `status`: show a leader's view of its cloud
//! - `replay`: print the job config of a (seed, trial) pair
//!
//! ## Example
//!
//! ```bash
//! # Full cycle from a config file
//! cloudfuzz --config cloudfuzz.toml run --trials 50
//!
//! # Existing cloud, fixed plan
//! cloudfuzz fuzz --leader 192.168.0.37:54321 --nodes 4 --plan
//!
//! # Reproduce trial 13 of a failing run
//! cloudfuzz replay --seed 7066883810153380318 --trial 13
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

mod commands;
mod config;

use cloudfuzz_types::NodeAddr;
use commands::{fuzz, replay, run, status, TrialOptions};
use config::RunConfig;

/// Config file picked up when `--config` is not given.
const DEFAULT_CONFIG: &str = "cloudfuzz.toml";

/// Provision a cloud and fuzz it with randomized jobs.
#[derive(Parser, Debug)]
#[command(name = "cloudfuzz")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Run configuration (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct TrialArgs {
    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured number of trials
    #[arg(long)]
    trials: Option<u64>,

    /// Jobs in flight at once
    #[arg(long)]
    parallelism: Option<usize>,

    /// Run the config's fixed [[plan]] instead of fuzzing
    #[arg(long)]
    plan: bool,

    /// Write the JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl From<TrialArgs> for TrialOptions {
    fn from(args: TrialArgs) -> Self {
        Self {
            seed: args.seed,
            trials: args.trials,
            parallelism: args.parallelism,
            plan: args.plan,
            report: args.report,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision hosts, wait for the cloud, run trials, tear down
    Run {
        #[command(flatten)]
        trials: TrialArgs,

        /// Leave workers running afterwards
        #[arg(long)]
        keep_cloud: bool,
    },

    /// Run trials against a cloud that is already up
    Fuzz {
        #[command(flatten)]
        trials: TrialArgs,

        /// Leader to submit to (host:port)
        #[arg(long)]
        leader: Option<NodeAddr>,

        /// Expected cloud size
        #[arg(long)]
        nodes: Option<usize>,
    },

    /// Show a leader's view of its cloud
    Status {
        /// Node to query (host:port)
        #[arg(long)]
        leader: NodeAddr,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the job config of a (seed, trial) pair
    Replay {
        /// Seed of the run
        #[arg(long)]
        seed: u64,

        /// Trial index
        #[arg(long)]
        trial: u64,

        /// Number of consecutive trials to print
        #[arg(long, default_value = "1")]
        count: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run { trials, keep_cloud } => {
            let config = load_config(cli.config.as_deref())?;
            run::run(&config, &trials.into(), keep_cloud).await?;
        }
        Commands::Fuzz {
            trials,
            leader,
            nodes,
        } => {
            let config = load_config(cli.config.as_deref())?;
            fuzz::run(&config, &trials.into(), leader, nodes).await?;
        }
        Commands::Status { leader, json } => {
            status::run(&leader, json).await?;
        }
        Commands::Replay { seed, trial, count } => {
            let config = load_config(cli.config.as_deref())?;
            replay::run(&config, seed, trial, count)?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Load `path`, else `cloudfuzz.toml` if present, else defaults.
fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_file(path).context("Failed to load config"),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            RunConfig::from_file(Path::new(DEFAULT_CONFIG)).context("Failed to load config")
        }
        None => Ok(RunConfig::default()),
    }
}
