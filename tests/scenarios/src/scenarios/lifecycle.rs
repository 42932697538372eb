//! Cloud lifecycle scenarios: provision, form, check, tear down.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cloudfuzz_client::{
        check_sandbox, ClusterStabilizer, ExecOutput, JobDispatcher, LaunchError, ProvisionError,
        TrialPlan, TrialRunner,
    };
    use cloudfuzz_core::{DispatchPolicy, ParameterFuzzer, SandboxScanner};
    use cloudfuzz_types::{JobKind, ParameterDomain};

    use crate::assertions::{assert_all_succeeded, assert_distinct_keys};
    use crate::simulated::SimulatedCloud;

    const POLL: Duration = Duration::from_millis(100);

    fn fuzzer(seed: u64) -> ParameterFuzzer {
        let domain = ParameterDomain::new()
            .param("ntree", [5, 50])
            .unwrap()
            .param_or_unset("max_depth", [2, 8])
            .unwrap();
        ParameterFuzzer::new(JobKind::new("RF"), domain, seed).unwrap()
    }

    /// Two hosts with two workers each; the leader sees all four after three
    /// partial polls.
    #[tokio::test(start_paused = true)]
    async fn two_hosts_two_nodes_form_cloud_of_four() {
        let mut cloud = SimulatedCloud::new(2, 2);
        cloud.provision().await.unwrap();
        cloud.form_after(3);

        for remote in &cloud.remotes {
            assert_eq!(remote.copies().len(), 1);
            assert_eq!(remote.commands_matching("nohup").len(), 2);
        }

        let leader = cloud.provisioned_leader().unwrap();
        let cluster = ClusterStabilizer::new(cloud.api.clone())
            .with_poll_interval(POLL)
            .stabilize(&leader, 4, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cluster.len(), 4);
        assert_eq!(cluster.leader(), &leader);
        assert_eq!(cluster.cloud_name(), Some("simulated"));
        assert_eq!(cloud.api.status_calls(), 4);

        let runner = TrialRunner::new(
            JobDispatcher::new(cloud.api.clone(), DispatchPolicy::new(POLL, 3)),
            Duration::from_secs(30),
        );
        let report = runner.run(&cluster, TrialPlan::fuzz(fuzzer(11), 5)).await;
        assert!(assert_all_succeeded(&report).passed);
        assert!(assert_distinct_keys(&report).passed);
        assert!(cloud
            .api
            .submitted()
            .iter()
            .all(|(node, _)| node == &leader));

        let sandbox = check_sandbox(&cloud.hosts, &SandboxScanner::new()).await;
        assert!(sandbox.is_clean());

        cloud.teardown().await;
        assert_eq!(cloud.kills(0), 2);
        assert_eq!(cloud.kills(1), 2);
        assert!(cloud.hosts.iter().all(|h| h.nodes().is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_cloud_reports_last_count() {
        let mut cloud = SimulatedCloud::new(2, 2);
        cloud.provision().await.unwrap();
        cloud.stall_at(3);

        let leader = cloud.provisioned_leader().unwrap();
        let err = ClusterStabilizer::new(cloud.api.clone())
            .with_poll_interval(POLL)
            .stabilize(&leader, 4, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.observed_count, 3);
        assert_eq!(err.expected_size, 4);

        cloud.teardown().await;
        assert_eq!(cloud.kills(0) + cloud.kills(1), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn leader_overshooting_expected_size_never_stabilizes() {
        let mut cloud = SimulatedCloud::new(2, 2);
        cloud.provision().await.unwrap();
        cloud.form_after(0);

        let leader = cloud.provisioned_leader().unwrap();
        let err = ClusterStabilizer::new(cloud.api.clone())
            .with_poll_interval(POLL)
            .stabilize(&leader, 3, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.observed_count, 4);
    }

    #[tokio::test]
    async fn unreachable_host_tears_down_the_rest() {
        let mut cloud = SimulatedCloud::new(2, 2);
        cloud.remotes[1].set_unreachable(true);

        let err = cloud.provision().await.unwrap_err();
        assert!(matches!(err, ProvisionError::Transfer(_)));

        assert_eq!(cloud.kills(0), 2);
        assert!(cloud.hosts.iter().all(|h| h.nodes().is_empty()));
    }

    #[tokio::test]
    async fn busy_port_fails_provisioning() {
        let mut cloud = SimulatedCloud::new(1, 2);
        cloud.remotes[0].respond("grep -q ':54324 '", ExecOutput::ok("in-use\n"));

        let err = cloud.provision().await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Launch(LaunchError::PortInUse { port: 54324, .. })
        ));
        // the worker already started on 54321 is killed again
        assert_eq!(cloud.kills(0), 1);
    }

    #[tokio::test]
    async fn sandbox_flags_errors_in_node_logs() {
        let mut cloud = SimulatedCloud::new(2, 2);
        cloud.provision().await.unwrap();
        cloud.seed_log(
            1,
            54324,
            "INFO cloud of 4 formed\nERROR java.lang.OutOfMemoryError in task 7\n",
        );

        let sandbox = check_sandbox(&cloud.hosts, &SandboxScanner::new()).await;
        assert_eq!(sandbox.findings.len(), 1);
        let finding = &sandbox.findings[0];
        assert_eq!(finding.node, "10.0.0.2:54324");
        assert_eq!(finding.line_number, 2);
        assert!(finding.line.contains("OutOfMemoryError"));
    }

    #[tokio::test]
    async fn unreadable_log_is_reported() {
        let mut cloud = SimulatedCloud::new(1, 1);
        cloud.provision().await.unwrap();
        cloud.remotes[0].fail_next_exec("cat: No such file or directory");

        let sandbox = check_sandbox(&cloud.hosts, &SandboxScanner::new()).await;
        assert!(sandbox.findings.is_empty());
        assert_eq!(sandbox.unreadable.len(), 1);
        assert!(!sandbox.is_clean());
    }
}
