//! Run trials against a cloud that is already up.

use anyhow::{Context, Result};

use cloudfuzz_client::ClusterStabilizer;
use cloudfuzz_types::NodeAddr;

use super::{finish, http_api, run_trials, TrialOptions};
use crate::config::RunConfig;

/// Run the fuzz command.
pub async fn run(
    config: &RunConfig,
    opts: &TrialOptions,
    leader: Option<NodeAddr>,
    nodes: Option<usize>,
) -> Result<()> {
    let leader = match leader {
        Some(addr) => addr,
        None => config
            .leader()?
            .context("no leader given: pass --leader or set `leader` in the config")?,
    };
    let expected = nodes.unwrap_or_else(|| config.expected_size());
    anyhow::ensure!(expected > 0, "expected node count is 0: pass --nodes or set expected_node_count");

    let api = http_api()?;
    let cluster = ClusterStabilizer::new(api.clone())
        .stabilize(&leader, expected, config.stabilization_timeout())
        .await
        .context("Cloud is not at the expected size")?;

    let report = run_trials(config, opts, api, &cluster).await?;
    finish(&report, opts.report.as_ref()).await
}
