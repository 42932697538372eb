//! Run configuration for cloudfuzz.
//!
//! Configuration is loaded from a TOML file (default: `cloudfuzz.toml`).
//!
//! ```toml
//! expected_node_count = 4
//! job_kind = "RF"
//! artifact = "target/h2o.jar"
//! seed = 7066883810153380318
//! trials = 100
//!
//! [[hosts]]
//! address = "192.168.0.37"
//! user = "0xdiag"
//! nodes_per_host = 2
//!
//! [[domain]]
//! name = "ntree"
//! values = [1, 3, 7, 23]
//!
//! [[domain]]
//! name = "depth"
//! values = [1, 10, 20, 100]
//! allow_unset = true
//!
//! [[validate]]
//! kind = "RF"
//! require = ["model_key"]
//! metric = "/error_rate"
//! min = 0.0
//! max = 1.0
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use cloudfuzz_client::{HostSpec, RemoteHost, SshExec};
use cloudfuzz_core::{DispatchPolicy, MetricBounds, RequireFields, SandboxScanner, ValidatorRegistry};
use cloudfuzz_types::{DomainError, JobConfig, JobKind, NodeAddr, ParamValue, ParameterDomain};

/// Root run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Nodes the cloud must reach (default: sum of `nodes_per_host`).
    pub expected_node_count: Option<usize>,
    /// Seconds to wait for the cloud to form (default: 60).
    #[serde(default = "default_stabilization_timeout_secs")]
    pub stabilization_timeout_secs: u64,
    /// Seconds one job may take before it is cancelled (default: 300).
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Consecutive transient poll errors absorbed per job (default: 3).
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Delay between job status polls, in ms (default: 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Trial stream seed (default: random, logged).
    pub seed: Option<u64>,
    /// Jobs in flight at once (default: 1).
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Trials per fuzz run (default: 10).
    #[serde(default = "default_trials")]
    pub trials: u64,
    /// Job kind the fuzzer targets (default: RF).
    #[serde(default = "default_job_kind")]
    pub job_kind: String,
    /// Local worker artifact to upload.
    pub artifact: Option<PathBuf>,
    /// Extra arguments passed to every worker.
    #[serde(default)]
    pub worker_args: Vec<String>,
    /// Existing cloud to target instead of provisioning (`host:port`).
    pub leader: Option<String>,
    /// Hosts to provision.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    /// Parameter domain, in sampling order.
    #[serde(default)]
    pub domain: Vec<DomainParam>,
    /// Fixed plan entries, run instead of fuzzing with `--plan`.
    #[serde(default)]
    pub plan: Vec<PlanEntry>,
    /// Result checks per job kind.
    #[serde(default)]
    pub validate: Vec<ValidateConfig>,
    /// Post-run log scan.
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// One host to provision.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Address workers bind and are reached at.
    pub address: String,
    /// SSH user.
    pub user: String,
    /// SSH private key (default: ssh's own choice).
    pub identity_file: Option<PathBuf>,
    /// Workers on this host (default: 2).
    #[serde(default = "default_nodes_per_host")]
    pub nodes_per_host: u16,
    /// First worker port (default: 54321).
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// Port distance between workers (default: 3).
    #[serde(default = "default_port_stride")]
    pub port_stride: u16,
    /// Remote working directory (default: /tmp/cloudfuzz).
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Command prefix that runs the artifact (default: `java -Xmx1g -jar`).
    #[serde(default = "default_launcher")]
    pub launcher: String,
}

/// One fuzzed parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainParam {
    /// Parameter name.
    pub name: String,
    /// Candidate values.
    #[serde(default)]
    pub values: Vec<ParamValue>,
    /// Also allow sending the parameter with no value.
    #[serde(default)]
    pub allow_unset: bool,
}

/// One fixed plan entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanEntry {
    /// Job kind (default: the run's `job_kind`).
    pub kind: Option<String>,
    /// Parameters to send.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Parameters to send with no value.
    #[serde(default)]
    pub unset: Vec<String>,
}

/// Result checks for one job kind.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateConfig {
    /// Job kind the checks apply to.
    pub kind: String,
    /// Fields (or JSON pointers) the payload must contain.
    #[serde(default)]
    pub require: Vec<String>,
    /// Numeric metric (field or JSON pointer) to bound.
    pub metric: Option<String>,
    /// Lower bound for `metric`.
    pub min: Option<f64>,
    /// Upper bound for `metric`.
    pub max: Option<f64>,
}

/// Post-run log scan configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    /// Scan node logs after a run (default: true).
    #[serde(default = "default_sandbox_enabled")]
    pub enabled: bool,
    /// Replace the default markers (ERROR, Exception, FATAL, SEVERE).
    pub markers: Option<Vec<String>>,
    /// Lines containing any of these are not findings.
    #[serde(default)]
    pub ignore: Vec<String>,
}

// Default value functions
fn default_stabilization_timeout_secs() -> u64 {
    60
}

fn default_job_timeout_secs() -> u64 {
    300
}

fn default_retry_count() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_parallelism() -> usize {
    1
}

fn default_trials() -> u64 {
    10
}

fn default_job_kind() -> String {
    "RF".to_string()
}

fn default_nodes_per_host() -> u16 {
    2
}

fn default_base_port() -> u16 {
    54321
}

fn default_port_stride() -> u16 {
    3
}

fn default_workdir() -> String {
    "/tmp/cloudfuzz".to_string()
}

fn default_launcher() -> String {
    "java -Xmx1g -jar".to_string()
}

fn default_sandbox_enabled() -> bool {
    true
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            enabled: default_sandbox_enabled(),
            markers: None,
            ignore: Vec::new(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            expected_node_count: None,
            stabilization_timeout_secs: default_stabilization_timeout_secs(),
            job_timeout_secs: default_job_timeout_secs(),
            retry_count: default_retry_count(),
            poll_interval_ms: default_poll_interval_ms(),
            seed: None,
            parallelism: default_parallelism(),
            trials: default_trials(),
            job_kind: default_job_kind(),
            artifact: None,
            worker_args: Vec::new(),
            leader: None,
            hosts: Vec::new(),
            domain: Vec::new(),
            plan: Vec::new(),
            validate: Vec::new(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Job kind the fuzzer targets.
    pub fn job_kind(&self) -> JobKind {
        JobKind::new(self.job_kind.clone())
    }

    /// Nodes the cloud must reach.
    pub fn expected_size(&self) -> usize {
        self.expected_node_count.unwrap_or_else(|| {
            self.hosts
                .iter()
                .map(|h| h.nodes_per_host as usize)
                .sum()
        })
    }

    /// Time budget for cloud formation.
    pub fn stabilization_timeout(&self) -> Duration {
        Duration::from_secs(self.stabilization_timeout_secs)
    }

    /// Time budget for one job.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Poll and retry policy for dispatch.
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::new(Duration::from_millis(self.poll_interval_ms), self.retry_count)
    }

    /// Configured leader of an existing cloud.
    pub fn leader(&self) -> Result<Option<NodeAddr>, ConfigError> {
        self.leader
            .as_deref()
            .map(|s| s.parse().map_err(|e: DomainError| ConfigError::Invalid(e.to_string())))
            .transpose()
    }

    /// Build the parameter domain.
    pub fn parameter_domain(&self) -> Result<ParameterDomain, ConfigError> {
        let mut domain = ParameterDomain::new();
        for param in &self.domain {
            let mut candidates = Vec::with_capacity(param.values.len() + 1);
            if param.allow_unset {
                candidates.push(ParamValue::Unset);
            }
            candidates.extend(param.values.iter().cloned());
            domain
                .push(&param.name, candidates)
                .map_err(|e| ConfigError::Invalid(format!("domain: {e}")))?;
        }
        Ok(domain)
    }

    /// Build the fixed plan.
    pub fn fixed_plan(&self) -> Result<Vec<JobConfig>, ConfigError> {
        self.plan
            .iter()
            .enumerate()
            .map(|(index, entry)| -> Result<JobConfig, DomainError> {
                let kind = entry.kind.clone().unwrap_or_else(|| self.job_kind.clone());
                let mut builder = JobConfig::builder(JobKind::new(kind));
                for (name, value) in &entry.params {
                    builder = builder.param(name, value.clone())?;
                }
                for name in &entry.unset {
                    builder = builder.param(name, ParamValue::Unset)?;
                }
                Ok(builder.build(index))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Invalid(format!("plan: {e}")))
    }

    /// Build the validator registry.
    pub fn validators(&self) -> ValidatorRegistry {
        let mut registry = ValidatorRegistry::new();
        for check in &self.validate {
            let kind = JobKind::new(check.kind.clone());
            if !check.require.is_empty() {
                registry.register(kind.clone(), RequireFields::new(check.require.clone()));
            }
            if let Some(metric) = &check.metric {
                registry.register(
                    kind,
                    MetricBounds::new(
                        metric.clone(),
                        check.min.unwrap_or(f64::NEG_INFINITY),
                        check.max.unwrap_or(f64::INFINITY),
                    ),
                );
            }
        }
        registry
    }

    /// Build the sandbox scanner.
    pub fn sandbox_scanner(&self) -> SandboxScanner {
        let mut scanner = SandboxScanner::new();
        if let Some(markers) = &self.sandbox.markers {
            scanner = scanner.with_markers(markers.clone());
        }
        for pattern in &self.sandbox.ignore {
            scanner = scanner.ignoring(pattern.clone());
        }
        scanner
    }

    /// Build the hosts to provision.
    pub fn remote_hosts(&self) -> Vec<RemoteHost<SshExec>> {
        self.hosts
            .iter()
            .map(|h| {
                let mut ssh = SshExec::new(h.address.clone(), h.user.clone());
                if let Some(identity) = &h.identity_file {
                    ssh = ssh.with_identity(identity.clone());
                }
                RemoteHost::new(h.spec(), ssh)
            })
            .collect()
    }
}

impl HostConfig {
    /// Static host description.
    pub fn spec(&self) -> HostSpec {
        HostSpec {
            address: self.address.clone(),
            workdir: self.workdir.clone(),
            launcher: self.launcher.clone(),
            node_count: self.nodes_per_host,
            base_port: self.base_port,
            port_stride: self.port_stride,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Parsed, but the values do not make sense.
    #[error("invalid config: {0}")]
    Invalid(String),
}
