//! Assertion helpers for run reports.
//!
//! Pure functions: they take a finished [`RunReport`] and return pass/fail
//! with enough detail to read the failure without rerunning.

use std::collections::HashSet;

use cloudfuzz_client::RunReport;
use cloudfuzz_core::ParameterFuzzer;
use cloudfuzz_types::{DispatchOutcome, JobConfig, Origin};

/// Result of an assertion check.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }
}

fn config_of(outcome: &DispatchOutcome) -> &JobConfig {
    match outcome {
        Ok(result) => &result.config,
        Err(failure) => &failure.config,
    }
}

fn position(origin: Origin) -> u64 {
    match origin {
        Origin::Trial { index, .. } => index,
        Origin::Plan { index } => index as u64,
    }
}

/// Every trial succeeded.
pub fn assert_all_succeeded(report: &RunReport) -> AssertionResult {
    let failures: Vec<String> = report.failures().map(|f| f.to_string()).collect();
    if failures.is_empty() {
        AssertionResult::pass(&format!("all {} trials succeeded", report.outcomes.len()))
    } else {
        AssertionResult::fail("all trials succeeded", &failures.join("; "))
    }
}

/// Outcomes appear in trial order, whatever order they completed in.
pub fn assert_ordered_by_trial(report: &RunReport) -> AssertionResult {
    let positions: Vec<u64> = report
        .outcomes
        .iter()
        .map(|o| position(config_of(o).origin()))
        .collect();
    if positions.windows(2).all(|w| w[0] < w[1]) {
        AssertionResult::pass("outcomes ordered by trial")
    } else {
        AssertionResult::fail("outcomes ordered by trial", &format!("order was {positions:?}"))
    }
}

/// Successful jobs were stored under distinct destination keys.
pub fn assert_distinct_keys(report: &RunReport) -> AssertionResult {
    let mut seen = HashSet::new();
    for result in report.results() {
        if !seen.insert(result.destination_key.as_str()) {
            return AssertionResult::fail(
                "destination keys distinct",
                &format!("key {} issued twice", result.destination_key),
            );
        }
    }
    AssertionResult::pass("destination keys distinct")
}

/// Every failure regenerates from its (seed, trial) with `fuzzer`.
pub fn assert_failures_replayable(report: &RunReport, fuzzer: &ParameterFuzzer) -> AssertionResult {
    for failure in report.failures() {
        let Origin::Trial { seed, index } = failure.config.origin() else {
            return AssertionResult::fail(
                "failures replayable",
                &format!("{} did not come from the fuzzer", failure.config),
            );
        };
        if seed != fuzzer.seed() || fuzzer.trial(index) != failure.config {
            return AssertionResult::fail(
                "failures replayable",
                &format!("seed={seed} trial={index} does not regenerate {}", failure.config),
            );
        }
    }
    AssertionResult::pass("failures replayable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudfuzz_types::{
        CompletionStatus, DestinationKey, FailureKind, FailureRecord, JobKind, JobResult, RunId,
    };
    use std::time::Duration;

    fn plan_config(index: usize) -> JobConfig {
        JobConfig::builder(JobKind::new("RF"))
            .param("ntree", index as i64)
            .unwrap()
            .build(index)
    }

    fn success(index: usize, key: &str) -> DispatchOutcome {
        let config = plan_config(index);
        Ok(JobResult {
            kind: config.kind().clone(),
            destination_key: DestinationKey::new(key),
            config,
            elapsed: Duration::from_millis(5),
            payload: serde_json::json!({}),
            status: CompletionStatus::Succeeded,
            retries: 0,
        })
    }

    fn report(outcomes: Vec<DispatchOutcome>) -> RunReport {
        RunReport {
            run_id: RunId::new(),
            seed: None,
            outcomes,
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn ordered_and_distinct_pass() {
        let r = report(vec![success(0, "a"), success(1, "b"), success(2, "c")]);
        assert!(assert_all_succeeded(&r).passed);
        assert!(assert_ordered_by_trial(&r).passed);
        assert!(assert_distinct_keys(&r).passed);
    }

    #[test]
    fn out_of_order_fails() {
        let r = report(vec![success(1, "a"), success(0, "b")]);
        let result = assert_ordered_by_trial(&r);
        assert!(!result.passed);
        assert!(result.failure_details.unwrap().contains("[1, 0]"));
    }

    #[test]
    fn repeated_key_fails() {
        let r = report(vec![success(0, "a"), success(1, "a")]);
        assert!(!assert_distinct_keys(&r).passed);
    }

    #[test]
    fn plan_failure_is_not_replayable() {
        let failure = FailureRecord::new(FailureKind::Fatal, plan_config(0), "rejected");
        let r = report(vec![Err(failure)]);
        let fuzzer = ParameterFuzzer::new(
            JobKind::new("RF"),
            cloudfuzz_types::ParameterDomain::new().param("ntree", [1, 2]).unwrap(),
            1,
        )
        .unwrap();
        assert!(!assert_all_succeeded(&r).passed);
        assert!(!assert_failures_replayable(&r, &fuzzer).passed);
    }
}
