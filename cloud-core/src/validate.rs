//! Per-kind result validation.
//!
//! A validator inspects a completed [`JobResult`] and decides whether the
//! payload is acceptable. Validators are registered per [`JobKind`]; kinds
//! with nothing registered pass.

use std::collections::HashMap;
use std::fmt;

use cloudfuzz_types::{JobKind, JobResult};
use serde_json::Value;

/// Verdict on one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Result is acceptable.
    Passed,
    /// Result is not acceptable.
    Failed {
        /// Why.
        reason: String,
    },
}

impl ValidationOutcome {
    /// Failed verdict.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// True if `Passed`.
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Check a completed job's result.
pub trait ResultValidator: Send + Sync {
    /// Short name used in logs and failure details.
    fn name(&self) -> &str;

    /// Inspect the result. Must not query the cluster.
    fn validate(&self, result: &JobResult) -> ValidationOutcome;
}

/// Resolve a field name or a JSON pointer against a payload.
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    if path.starts_with('/') {
        payload.pointer(path)
    } else {
        payload.get(path)
    }
}

/// Payload must contain every listed field (plain key or JSON pointer).
#[derive(Debug, Clone)]
pub struct RequireFields {
    fields: Vec<String>,
}

impl RequireFields {
    /// Require the given fields.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResultValidator for RequireFields {
    fn name(&self) -> &str {
        "require-fields"
    }

    fn validate(&self, result: &JobResult) -> ValidationOutcome {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| lookup(&result.payload, f).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            ValidationOutcome::Passed
        } else {
            ValidationOutcome::failed(format!("missing fields: {}", missing.join(", ")))
        }
    }
}

/// A numeric metric must be finite and inside `[min, max]`.
#[derive(Debug, Clone)]
pub struct MetricBounds {
    path: String,
    min: f64,
    max: f64,
}

impl MetricBounds {
    /// Bound the metric at `path` (plain key or JSON pointer).
    pub fn new(path: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            path: path.into(),
            min,
            max,
        }
    }

    /// Metric must be finite; no range.
    pub fn finite(path: impl Into<String>) -> Self {
        Self::new(path, f64::NEG_INFINITY, f64::INFINITY)
    }
}

impl ResultValidator for MetricBounds {
    fn name(&self) -> &str {
        "metric-bounds"
    }

    fn validate(&self, result: &JobResult) -> ValidationOutcome {
        let Some(value) = lookup(&result.payload, &self.path) else {
            return ValidationOutcome::failed(format!("metric {} missing", self.path));
        };
        // Some engines report NaN/Infinity as strings.
        let metric = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        };
        match metric {
            None => ValidationOutcome::failed(format!("metric {} is not numeric: {value}", self.path)),
            Some(m) if !m.is_finite() => {
                ValidationOutcome::failed(format!("metric {} is not finite: {m}", self.path))
            }
            Some(m) if m < self.min || m > self.max => ValidationOutcome::failed(format!(
                "metric {} = {m} outside [{}, {}]",
                self.path, self.min, self.max
            )),
            Some(_) => ValidationOutcome::Passed,
        }
    }
}

/// Validators keyed by job kind.
#[derive(Default)]
pub struct ValidatorRegistry {
    by_kind: HashMap<JobKind, Vec<Box<dyn ResultValidator>>>,
}

impl ValidatorRegistry {
    /// Empty registry; every kind passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator for `kind`. Validators run in registration order.
    pub fn register(&mut self, kind: JobKind, validator: impl ResultValidator + 'static) {
        self.by_kind.entry(kind).or_default().push(Box::new(validator));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, kind: JobKind, validator: impl ResultValidator + 'static) -> Self {
        self.register(kind, validator);
        self
    }

    /// Number of validators registered for `kind`.
    pub fn count_for(&self, kind: &JobKind) -> usize {
        self.by_kind.get(kind).map_or(0, Vec::len)
    }

    /// Run every validator for the result's kind; the first failure wins.
    pub fn validate(&self, result: &JobResult) -> ValidationOutcome {
        let Some(validators) = self.by_kind.get(&result.kind) else {
            return ValidationOutcome::Passed;
        };
        for v in validators {
            if let ValidationOutcome::Failed { reason } = v.validate(result) {
                return ValidationOutcome::failed(format!("{}: {reason}", v.name()));
            }
        }
        ValidationOutcome::Passed
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, validators) in &self.by_kind {
            let names: Vec<&str> = validators.iter().map(|v| v.name()).collect();
            map.entry(kind, &names);
        }
        map.finish()
    }
}
