//! Seeded trial streams: reproducibility, replay, parallel runs.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cloudfuzz_client::{JobDispatcher, MockClusterApi, TrialPlan, TrialRunner};
    use cloudfuzz_core::{DispatchPolicy, ParameterFuzzer};
    use cloudfuzz_types::{
        FailureKind, JobConfig, JobKind, Origin, ParameterDomain, ProgressResponse,
    };

    use crate::assertions::{
        assert_distinct_keys, assert_failures_replayable, assert_ordered_by_trial,
    };
    use crate::simulated::SimulatedCloud;

    const POLL: Duration = Duration::from_millis(50);

    fn domain() -> ParameterDomain {
        ParameterDomain::new()
            .param("ntrees", [1, 5, 50])
            .unwrap()
            .param_or_unset("max_depth", [1, 5, 20])
            .unwrap()
            .param("distribution", ["bernoulli", "gaussian", "poisson"])
            .unwrap()
            .param("learn_rate", [0.01, 0.1, 1.0])
            .unwrap()
    }

    fn fuzzer(seed: u64) -> ParameterFuzzer {
        ParameterFuzzer::new(JobKind::new("GBM"), domain(), seed).unwrap()
    }

    fn runner(api: &MockClusterApi, parallelism: usize) -> TrialRunner<MockClusterApi> {
        TrialRunner::new(
            JobDispatcher::new(api.clone(), DispatchPolicy::new(POLL, 2)),
            Duration::from_secs(30),
        )
        .with_parallelism(parallelism)
    }

    fn submitted_configs(api: &MockClusterApi) -> Vec<JobConfig> {
        api.submitted().into_iter().map(|(_, c)| c).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn same_seed_submits_same_configs() {
        let cluster = SimulatedCloud::new(1, 3).formed().unwrap();

        let first = MockClusterApi::new();
        runner(&first, 1)
            .run(&cluster, TrialPlan::fuzz(fuzzer(2024), 20))
            .await;
        let second = MockClusterApi::new();
        runner(&second, 1)
            .run(&cluster, TrialPlan::fuzz(fuzzer(2024), 20))
            .await;
        let other = MockClusterApi::new();
        runner(&other, 1)
            .run(&cluster, TrialPlan::fuzz(fuzzer(2025), 20))
            .await;

        assert_eq!(submitted_configs(&first).len(), 20);
        assert_eq!(submitted_configs(&first), submitted_configs(&second));
        assert_ne!(submitted_configs(&first), submitted_configs(&other));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_trial_replays_from_seed_and_index() {
        let cluster = SimulatedCloud::new(1, 2).formed().unwrap();
        let api = MockClusterApi::new();
        // trial 0 polls twice, trial 1 errors on its first poll
        api.queue_progress(Ok(ProgressResponse::running(0.5)));
        api.queue_progress(Ok(ProgressResponse::done()));
        api.queue_progress(Ok(ProgressResponse::error("Illegal argument: learn_rate")));

        let report = runner(&api, 1)
            .run(&cluster, TrialPlan::fuzz(fuzzer(77), 4))
            .await;

        assert_eq!(report.seed, Some(77));
        assert_eq!(report.failed(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.kind, FailureKind::Fatal);
        assert_eq!(failure.config.origin(), Origin::Trial { seed: 77, index: 1 });
        assert!(assert_failures_replayable(&report, &fuzzer(77)).passed);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_run_reports_in_trial_order() {
        let cluster = SimulatedCloud::new(2, 2).formed().unwrap();
        let api = MockClusterApi::new();
        for _ in 0..8 {
            api.queue_progress(Ok(ProgressResponse::running(0.1)));
        }

        let report = runner(&api, 4)
            .run(&cluster, TrialPlan::fuzz(fuzzer(5), 12))
            .await;

        assert_eq!(report.outcomes.len(), 12);
        assert!(report.is_success());
        assert!(assert_ordered_by_trial(&report).passed);
        assert!(assert_distinct_keys(&report).passed);
    }

    #[test]
    fn generated_configs_stay_inside_domain() {
        let domain = domain();
        for config in fuzzer(9).take(200) {
            assert!(!config.params().is_empty());
            assert!(config.params().len() <= domain.len());
            for (name, value) in config.params() {
                let candidates = domain.candidates(name).unwrap();
                assert!(candidates.contains(value), "{name}={value} outside domain");
            }
        }
    }
}
