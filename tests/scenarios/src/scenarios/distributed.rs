//! Real-host scenarios.
//!
//! All tests: `#[ignore = "requires distributed"]`. Hosts and artifact come
//! from the environment, see [`crate::distributed`].

// Helpers only used by #[ignore] tests
#![allow(dead_code, unused_imports)]

use std::time::Duration;

use cloudfuzz_client::{
    check_sandbox, expected_size, leader_of, provision, teardown_all, ClusterStabilizer,
    HttpClusterApi, RemoteHost, SshExec,
};
use cloudfuzz_core::SandboxScanner;
use cloudfuzz_types::Cluster;

use crate::distributed::{DistributedConfig, STABILIZE_TIMEOUT_SECS};

/// Provision the configured hosts and wait for the cloud.
async fn setup() -> (DistributedConfig, Vec<RemoteHost<SshExec>>, Cluster) {
    let config = DistributedConfig::from_env().expect("distributed environment not set");
    let mut hosts = config.remote_hosts();
    provision(&mut hosts, &config.artifact, &[])
        .await
        .expect("provision failed");

    let leader = leader_of(&hosts).expect("no nodes");
    let api = HttpClusterApi::new(Duration::from_secs(10)).expect("http client");
    let cluster = match ClusterStabilizer::new(api)
        .stabilize(
            &leader,
            expected_size(&hosts),
            Duration::from_secs(STABILIZE_TIMEOUT_SECS),
        )
        .await
    {
        Ok(cluster) => cluster,
        Err(e) => {
            teardown_all(&mut hosts).await;
            panic!("cloud did not form: {e}");
        }
    };
    (config, hosts, cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudfuzz_client::{JobDispatcher, TrialPlan, TrialRunner};
    use cloudfuzz_core::{DispatchPolicy, ParameterFuzzer};
    use cloudfuzz_types::{JobKind, ParameterDomain};

    /// The cloud forms with every launched worker, then tears down cleanly.
    #[tokio::test]
    #[ignore = "requires distributed"]
    async fn cloud_forms_on_real_hosts() {
        let (config, mut hosts, cluster) = setup().await;
        assert_eq!(cluster.len(), config.expected_size());

        teardown_all(&mut hosts).await;
        assert!(hosts.iter().all(|h| h.nodes().is_empty()));
    }

    /// A short fuzz run against real workers leaves clean logs.
    #[tokio::test]
    #[ignore = "requires distributed"]
    async fn short_fuzz_run_on_real_hosts() {
        let (_config, mut hosts, cluster) = setup().await;

        let domain = ParameterDomain::new()
            .param("ntree", [1, 5])
            .unwrap()
            .param_or_unset("max_depth", [2, 10])
            .unwrap();
        let fuzzer = ParameterFuzzer::new(JobKind::new("RF"), domain, 1).unwrap();
        let api = HttpClusterApi::new(Duration::from_secs(10)).unwrap();
        let runner = TrialRunner::new(
            JobDispatcher::new(api, DispatchPolicy::default()),
            Duration::from_secs(300),
        );
        let report = runner.run(&cluster, TrialPlan::fuzz(fuzzer, 3)).await;
        let sandbox = check_sandbox(&hosts, &SandboxScanner::new()).await;

        teardown_all(&mut hosts).await;
        assert_eq!(report.outcomes.len(), 3);
        assert!(sandbox.unreadable.is_empty(), "{:?}", sandbox.unreadable);
    }
}
