//! Typed job parameters: candidate domains and concrete job configurations.
//!
//! A [`ParameterDomain`] lists, for each parameter name, the values a trial may
//! pick. A [`JobConfig`] is one concrete pick, tagged with the seed and trial
//! index (or plan position) that produced it so a failing case can be replayed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{DomainError, JobKind};

/// A single candidate or chosen parameter value.
///
/// `Unset` is an explicit sentinel meaning "send this parameter with no
/// value" and is distinct from the parameter being absent from a config.
/// On the wire it is JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicitly unset.
    Unset,
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value (keys, column specs, enum names).
    Str(String),
}

impl ParamValue {
    /// Check if this is the unset sentinel.
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// False only for NaN and infinite floats.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    /// JSON representation sent to the cluster.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Unset => serde_json::Value::Null,
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Str(v) => serde_json::Value::String(v.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "<unset>"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DomainEntry {
    name: String,
    candidates: Vec<ParamValue>,
}

/// Ordered mapping from parameter name to its candidate values.
///
/// Insertion order is stable and participates in sampling, so two domains
/// with the same entries in a different order yield different trial streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterDomain {
    entries: Vec<DomainEntry>,
}

impl ParameterDomain {
    /// Create an empty domain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, consuming and returning the domain for chaining.
    pub fn param<I, V>(mut self, name: &str, candidates: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.push(name, candidates.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    /// Add a parameter whose candidate list starts with [`ParamValue::Unset`].
    pub fn param_or_unset<I, V>(self, name: &str, candidates: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        let values = std::iter::once(ParamValue::Unset)
            .chain(candidates.into_iter().map(Into::into))
            .collect::<Vec<_>>();
        self.param(name, values)
    }

    /// Add a parameter with an already-built candidate list.
    pub fn push(&mut self, name: &str, candidates: Vec<ParamValue>) -> Result<(), DomainError> {
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        if self.entries.iter().any(|e| e.name == name) {
            return Err(DomainError::DuplicateParameter(name.to_string()));
        }
        if candidates.is_empty() {
            return Err(DomainError::NoCandidates(name.to_string()));
        }
        if !candidates.iter().all(ParamValue::is_finite) {
            return Err(DomainError::NonFiniteValue(name.to_string()));
        }
        self.entries.push(DomainEntry {
            name: name.to_string(),
            candidates,
        });
        Ok(())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the domain has no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameter at `index` in insertion order.
    pub fn entry(&self, index: usize) -> Option<(&str, &[ParamValue])> {
        self.entries
            .get(index)
            .map(|e| (e.name.as_str(), e.candidates.as_slice()))
    }

    /// Candidate values for a named parameter.
    pub fn candidates(&self, name: &str) -> Option<&[ParamValue]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.candidates.as_slice())
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Where a [`JobConfig`] came from, for reproducing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Generated by the parameter fuzzer.
    Trial {
        /// Fuzzer seed.
        seed: u64,
        /// Zero-based trial index within the seeded stream.
        index: u64,
    },
    /// Taken from a fixed test plan.
    Plan {
        /// Zero-based position in the plan.
        index: usize,
    },
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trial { seed, index } => write!(f, "seed={seed} trial={index}"),
            Self::Plan { index } => write!(f, "plan entry {index}"),
        }
    }
}

/// A concrete job configuration. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    kind: JobKind,
    params: BTreeMap<String, ParamValue>,
    origin: Origin,
}

impl JobConfig {
    /// Build a config for a fuzzed trial.
    ///
    /// Callers outside the fuzzer should prefer [`JobConfig::builder`].
    pub fn from_trial(
        kind: JobKind,
        seed: u64,
        index: u64,
        params: BTreeMap<String, ParamValue>,
    ) -> Self {
        Self {
            kind,
            params,
            origin: Origin::Trial { seed, index },
        }
    }

    /// Start building an explicit (plan) config.
    pub fn builder(kind: JobKind) -> JobConfigBuilder {
        JobConfigBuilder {
            kind,
            params: BTreeMap::new(),
        }
    }

    /// Job kind.
    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// Chosen parameters. Parameters not present take the job kind's defaults.
    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// Look up one parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Where this config came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Parameters as the JSON object posted to the submission endpoint.
    pub fn to_wire_params(&self) -> serde_json::Map<String, serde_json::Value> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl fmt::Display for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.kind)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "}} ({})", self.origin)
    }
}

/// Builder for explicit job configs with validated keys.
#[derive(Debug, Clone)]
pub struct JobConfigBuilder {
    kind: JobKind,
    params: BTreeMap<String, ParamValue>,
}

impl JobConfigBuilder {
    /// Set a parameter. Rejects empty and repeated names, NaN and infinities.
    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Result<Self, DomainError> {
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        if self.params.contains_key(name) {
            return Err(DomainError::DuplicateParameter(name.to_string()));
        }
        let value = value.into();
        if !value.is_finite() {
            return Err(DomainError::NonFiniteValue(name.to_string()));
        }
        self.params.insert(name.to_string(), value);
        Ok(self)
    }

    /// Finish the config as entry `index` of a fixed plan.
    pub fn build(self, index: usize) -> JobConfig {
        JobConfig {
            kind: self.kind,
            params: self.params,
            origin: Origin::Plan { index },
        }
    }
}
