//! CLI command implementations.

pub mod fuzz;
pub mod replay;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use cloudfuzz_client::{ClusterApi, HttpClusterApi, JobDispatcher, RunReport, TrialPlan, TrialRunner};
use cloudfuzz_core::ParameterFuzzer;
use cloudfuzz_types::Cluster;
use tracing::info;

use crate::config::RunConfig;

/// Per-request HTTP timeout; job-level timeouts are enforced separately.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Command-line overrides for trial runs.
#[derive(Debug, Clone, Default)]
pub struct TrialOptions {
    /// Override the configured seed.
    pub seed: Option<u64>,
    /// Override the configured trial count.
    pub trials: Option<u64>,
    /// Override the configured parallelism.
    pub parallelism: Option<usize>,
    /// Run the fixed plan instead of fuzzing.
    pub plan: bool,
    /// Write the JSON report here.
    pub report: Option<PathBuf>,
}

/// HTTP API client with the CLI's request timeout.
pub fn http_api() -> Result<HttpClusterApi> {
    HttpClusterApi::new(REQUEST_TIMEOUT).context("Failed to build HTTP client")
}

/// Build the plan a run will execute.
pub fn trial_plan(config: &RunConfig, opts: &TrialOptions) -> Result<TrialPlan> {
    if opts.plan {
        let plan = config.fixed_plan()?;
        anyhow::ensure!(!plan.is_empty(), "--plan given but the config has no [[plan]] entries");
        return Ok(TrialPlan::fixed(plan));
    }

    let seed = opts
        .seed
        .or(config.seed)
        .unwrap_or_else(rand::random::<u64>);
    let domain = config.parameter_domain()?;
    let fuzzer = ParameterFuzzer::new(config.job_kind(), domain, seed)
        .context("The config needs at least one [[domain]] parameter to fuzz")?;
    let trials = opts.trials.unwrap_or(config.trials);
    Ok(TrialPlan::fuzz(fuzzer, trials))
}

/// Run trials against a stabilized cluster.
pub async fn run_trials<A: ClusterApi>(
    config: &RunConfig,
    opts: &TrialOptions,
    api: A,
    cluster: &Cluster,
) -> Result<RunReport> {
    let plan = trial_plan(config, opts)?;
    if let Some(seed) = plan.seed() {
        info!(seed, "Replay any trial with: cloudfuzz replay --seed {seed} --trial <index>");
    }
    let runner = TrialRunner::new(
        JobDispatcher::new(api, config.dispatch_policy()),
        config.job_timeout(),
    )
    .with_validators(config.validators())
    .with_parallelism(opts.parallelism.unwrap_or(config.parallelism));
    Ok(runner.run(cluster, plan).await)
}

/// Print the report, write it if asked, and fail if any trial failed.
pub async fn finish(report: &RunReport, path: Option<&PathBuf>) -> Result<()> {
    println!("{report}");
    for failure in report.failures() {
        println!("  {failure}");
    }

    if let Some(path) = path {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    anyhow::ensure!(report.is_success(), "{} of {} trials failed", report.failed(), report.outcomes.len());
    Ok(())
}
