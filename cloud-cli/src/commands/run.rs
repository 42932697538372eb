//! Provision hosts, stabilize the cloud, run trials, tear down.

use anyhow::{Context, Result};

use cloudfuzz_client::{
    check_sandbox, expected_size, leader_of, provision, teardown_all, ClusterStabilizer,
    RemoteHost, RunReport, SshExec,
};
use tracing::{info, warn};

use super::{finish, http_api, run_trials, TrialOptions};
use crate::config::RunConfig;

/// Run the full provision-to-teardown cycle.
pub async fn run(config: &RunConfig, opts: &TrialOptions, keep_cloud: bool) -> Result<()> {
    let artifact = config
        .artifact
        .as_ref()
        .context("`artifact` must be set in the config to provision hosts")?;
    anyhow::ensure!(!config.hosts.is_empty(), "no [[hosts]] configured");

    let mut hosts = config.remote_hosts();
    provision(&mut hosts, artifact, &config.worker_args)
        .await
        .context("Provisioning failed")?;

    let outcome = drive(config, opts, &hosts).await;

    if config.sandbox.enabled {
        let sandbox = check_sandbox(&hosts, &config.sandbox_scanner()).await;
        for finding in &sandbox.findings {
            println!("  sandbox: {finding}");
        }
        if !sandbox.is_clean() {
            warn!(
                findings = sandbox.findings.len(),
                unreadable = sandbox.unreadable.len(),
                "Sandbox check not clean"
            );
        }
    }

    if keep_cloud {
        info!("Leaving cloud running (--keep-cloud)");
    } else {
        teardown_all(&mut hosts).await;
    }

    let report = outcome?;
    finish(&report, opts.report.as_ref()).await
}

async fn drive(
    config: &RunConfig,
    opts: &TrialOptions,
    hosts: &[RemoteHost<SshExec>],
) -> Result<RunReport> {
    let leader = leader_of(hosts).context("hosts define no nodes")?;
    let expected = config.expected_node_count.unwrap_or_else(|| expected_size(hosts));
    let api = http_api()?;

    let cluster = ClusterStabilizer::new(api.clone())
        .stabilize(&leader, expected, config.stabilization_timeout())
        .await
        .context("Cloud did not form")?;
    println!("Cloud of {} nodes formed, leader {}", cluster.len(), cluster.leader());

    run_trials(config, opts, api, &cluster).await
}
