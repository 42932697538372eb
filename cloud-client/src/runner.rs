//! Trial runner: drives a plan of job configs through dispatch and
//! validation and collects a [`RunReport`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use cloudfuzz_core::{ParameterFuzzer, ValidationOutcome, ValidatorRegistry};
use cloudfuzz_types::{
    Cluster, DispatchOutcome, FailureKind, FailureRecord, JobConfig, JobResult, RunId,
};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::api::ClusterApi;
use crate::dispatcher::JobDispatcher;

/// Where a run's job configs come from.
#[derive(Debug, Clone)]
pub enum TrialPlan {
    /// The first `trials` configs of a seeded fuzzer.
    Fuzz {
        /// Config stream.
        fuzzer: ParameterFuzzer,
        /// Number of trials to draw.
        trials: u64,
    },
    /// An explicit list, run in order.
    Fixed(Vec<JobConfig>),
}

impl TrialPlan {
    /// Plan drawing `trials` configs from `fuzzer`.
    pub fn fuzz(fuzzer: ParameterFuzzer, trials: u64) -> Self {
        Self::Fuzz { fuzzer, trials }
    }

    /// Plan running exactly `configs`.
    pub fn fixed(configs: Vec<JobConfig>) -> Self {
        Self::Fixed(configs)
    }

    /// Seed needed to replay the plan, if it is fuzzed.
    pub fn seed(&self) -> Option<u64> {
        match self {
            Self::Fuzz { fuzzer, .. } => Some(fuzzer.seed()),
            Self::Fixed(_) => None,
        }
    }

    /// Number of trials the plan will run.
    pub fn len(&self) -> usize {
        match self {
            Self::Fuzz { trials, .. } => *trials as usize,
            Self::Fixed(configs) => configs.len(),
        }
    }

    /// True if the plan runs nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_configs(self) -> Box<dyn Iterator<Item = JobConfig> + Send> {
        match self {
            Self::Fuzz { fuzzer, trials } => Box::new(fuzzer.take(trials as usize)),
            Self::Fixed(configs) => Box::new(configs.into_iter()),
        }
    }
}

/// Outcome of a whole run, ordered by trial.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identifier of this run, for log correlation.
    pub run_id: RunId,
    /// Seed of a fuzzed plan.
    pub seed: Option<u64>,
    /// One outcome per trial, in plan order.
    pub outcomes: Vec<DispatchOutcome>,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl RunReport {
    /// Trials that passed dispatch and validation.
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Trials that failed for any reason.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// True if every trial passed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Successful results.
    pub fn results(&self) -> impl Iterator<Item = &JobResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    /// Failure records.
    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    /// Failure counts per classification.
    pub fn failure_counts(&self) -> HashMap<FailureKind, usize> {
        let mut counts = HashMap::new();
        for failure in self.failures() {
            *counts.entry(failure.kind).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: {} passed, {} failed of {} trials in {:.1}s",
            self.run_id,
            self.passed(),
            self.failed(),
            self.outcomes.len(),
            self.elapsed.as_secs_f64()
        )?;
        if let Some(seed) = self.seed {
            write!(f, " (seed {seed})")?;
        }
        Ok(())
    }
}

/// Runs trial plans against a stabilized cluster.
pub struct TrialRunner<A: ClusterApi> {
    dispatcher: JobDispatcher<A>,
    validators: ValidatorRegistry,
    job_timeout: Duration,
    parallelism: usize,
}

impl<A: ClusterApi> TrialRunner<A> {
    /// Sequential runner with no validators.
    pub fn new(dispatcher: JobDispatcher<A>, job_timeout: Duration) -> Self {
        Self {
            dispatcher,
            validators: ValidatorRegistry::new(),
            job_timeout,
            parallelism: 1,
        }
    }

    /// Validate results with `validators`.
    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    /// Keep up to `parallelism` jobs in flight (minimum 1).
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Run every trial of `plan` and report outcomes in plan order.
    pub async fn run(&self, cluster: &Cluster, plan: TrialPlan) -> RunReport {
        let run_id = RunId::new();
        let seed = plan.seed();
        let started = Instant::now();

        // Logged before anything is dispatched so a crashed run is still
        // replayable.
        info!(
            run = %run_id,
            seed = ?seed,
            trials = plan.len(),
            parallelism = self.parallelism,
            leader = %cluster.leader(),
            "Starting run"
        );

        let outcomes: Vec<DispatchOutcome> = stream::iter(plan.into_configs())
            .map(|config| self.run_trial(cluster, config))
            .buffered(self.parallelism)
            .collect()
            .await;

        let report = RunReport {
            run_id,
            seed,
            outcomes,
            elapsed: started.elapsed(),
        };
        info!(%report, "Run finished");
        report
    }

    async fn run_trial(&self, cluster: &Cluster, config: JobConfig) -> DispatchOutcome {
        let result = self
            .dispatcher
            .submit(cluster, &config, self.job_timeout)
            .await?;
        match self.validators.validate(&result) {
            ValidationOutcome::Passed => Ok(result),
            ValidationOutcome::Failed { reason } => {
                let failure = FailureRecord::validation(&result, reason);
                warn!(%failure, "Validation failed");
                Err(failure)
            }
        }
    }
}
