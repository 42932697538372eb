//! Print the job configs of specific trials without contacting a cluster.

use anyhow::{Context, Result};

use cloudfuzz_core::ParameterFuzzer;
use cloudfuzz_types::JobConfig;

use crate::config::RunConfig;

/// Configs of trials `trial .. trial + count` for `seed`.
pub fn configs(config: &RunConfig, seed: u64, trial: u64, count: u64) -> Result<Vec<JobConfig>> {
    let mut fuzzer = ParameterFuzzer::new(config.job_kind(), config.parameter_domain()?, seed)
        .context("The config needs at least one [[domain]] parameter to replay")?;
    fuzzer.seek(trial);
    Ok((trial..trial.saturating_add(count))
        .map(|_| fuzzer.next_config())
        .collect())
}

/// Run the replay command.
pub fn run(config: &RunConfig, seed: u64, trial: u64, count: u64) -> Result<()> {
    for job in configs(config, seed, trial, count)? {
        println!("{job}");
        println!("{}", serde_json::to_string_pretty(&job.to_wire_params())?);
    }
    Ok(())
}
