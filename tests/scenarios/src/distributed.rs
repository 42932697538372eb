//! Real-host setup read from the environment.
//!
//! - `CLOUDFUZZ_HOSTS`: comma-separated `user@host` entries (required)
//! - `CLOUDFUZZ_ARTIFACT`: local path of the worker artifact (required)
//! - `CLOUDFUZZ_NODES_PER_HOST`: workers per host (default 2)
//! - `CLOUDFUZZ_IDENTITY`: ssh identity file (optional)

use std::path::PathBuf;

use cloudfuzz_client::{HostSpec, RemoteHost, SshExec};
use thiserror::Error;

/// Hosts to provision.
pub const HOSTS_VAR: &str = "CLOUDFUZZ_HOSTS";
/// Worker artifact.
pub const ARTIFACT_VAR: &str = "CLOUDFUZZ_ARTIFACT";
/// Workers per host.
pub const NODES_VAR: &str = "CLOUDFUZZ_NODES_PER_HOST";
/// ssh identity file.
pub const IDENTITY_VAR: &str = "CLOUDFUZZ_IDENTITY";

/// SSH connection timeout in seconds.
pub const SSH_TIMEOUT_SECS: u64 = 30;

/// Stabilization timeout for real clouds in seconds.
pub const STABILIZE_TIMEOUT_SECS: u64 = 120;

/// Environment errors.
#[derive(Debug, Error)]
pub enum DistributedConfigError {
    /// A required variable is unset.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A host entry is not `user@host`.
    #[error("bad host entry {0:?}, expected user@host")]
    BadHost(String),

    /// `CLOUDFUZZ_NODES_PER_HOST` is not a positive number.
    #[error("bad node count {0:?}")]
    BadNodeCount(String),
}

/// One `user@host` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// Login user.
    pub user: String,
    /// Host address.
    pub host: String,
}

/// Real-host settings.
#[derive(Debug, Clone)]
pub struct DistributedConfig {
    /// Hosts, first one carries the leader.
    pub targets: Vec<SshTarget>,
    /// Worker artifact.
    pub artifact: PathBuf,
    /// Workers per host.
    pub nodes_per_host: u16,
    /// ssh identity file.
    pub identity: Option<PathBuf>,
}

impl DistributedConfig {
    /// Read settings from the environment.
    pub fn from_env() -> Result<Self, DistributedConfigError> {
        let hosts = std::env::var(HOSTS_VAR).map_err(|_| DistributedConfigError::Missing(HOSTS_VAR))?;
        let artifact =
            std::env::var(ARTIFACT_VAR).map_err(|_| DistributedConfigError::Missing(ARTIFACT_VAR))?;
        let nodes_per_host = match std::env::var(NODES_VAR) {
            Ok(raw) => parse_node_count(&raw)?,
            Err(_) => 2,
        };

        Ok(Self {
            targets: parse_targets(&hosts)?,
            artifact: PathBuf::from(artifact),
            nodes_per_host,
            identity: std::env::var(IDENTITY_VAR).ok().map(PathBuf::from),
        })
    }

    /// Workers across all hosts.
    pub fn expected_size(&self) -> usize {
        self.targets.len() * self.nodes_per_host as usize
    }

    /// Hosts driven over ssh.
    pub fn remote_hosts(&self) -> Vec<RemoteHost<SshExec>> {
        self.targets
            .iter()
            .map(|t| {
                let mut ssh = SshExec::new(t.host.clone(), t.user.clone())
                    .with_connect_timeout(SSH_TIMEOUT_SECS);
                if let Some(identity) = &self.identity {
                    ssh = ssh.with_identity(identity.clone());
                }
                RemoteHost::new(HostSpec::new(t.host.clone()).with_nodes(self.nodes_per_host), ssh)
            })
            .collect()
    }
}

/// Parse `user@host,user@host`.
pub fn parse_targets(raw: &str) -> Result<Vec<SshTarget>, DistributedConfigError> {
    let targets = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('@') {
            Some((user, host)) if !user.is_empty() && !host.is_empty() => Ok(SshTarget {
                user: user.to_string(),
                host: host.to_string(),
            }),
            _ => Err(DistributedConfigError::BadHost(entry.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        return Err(DistributedConfigError::Missing(HOSTS_VAR));
    }
    Ok(targets)
}

fn parse_node_count(raw: &str) -> Result<u16, DistributedConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DistributedConfigError::BadNodeCount(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_parse() {
        let targets = parse_targets("ops@10.0.0.5, ci@build-2").unwrap();
        assert_eq!(
            targets,
            vec![
                SshTarget {
                    user: "ops".into(),
                    host: "10.0.0.5".into()
                },
                SshTarget {
                    user: "ci".into(),
                    host: "build-2".into()
                },
            ]
        );
    }

    #[test]
    fn target_without_user_is_rejected() {
        assert!(matches!(
            parse_targets("10.0.0.5"),
            Err(DistributedConfigError::BadHost(_))
        ));
        assert!(matches!(
            parse_targets("@10.0.0.5"),
            Err(DistributedConfigError::BadHost(_))
        ));
    }

    #[test]
    fn empty_host_list_is_missing() {
        assert!(matches!(
            parse_targets(" , "),
            Err(DistributedConfigError::Missing(HOSTS_VAR))
        ));
    }

    #[test]
    fn node_count_must_be_positive() {
        assert_eq!(parse_node_count("3").unwrap(), 3);
        assert!(parse_node_count("0").is_err());
        assert!(parse_node_count("many").is_err());
    }

    #[test]
    fn remote_hosts_use_node_count() {
        let config = DistributedConfig {
            targets: parse_targets("ops@a,ops@b").unwrap(),
            artifact: PathBuf::from("worker.jar"),
            nodes_per_host: 3,
            identity: None,
        };
        assert_eq!(config.expected_size(), 6);
        let hosts = config.remote_hosts();
        assert_eq!(hosts[1].spec().node_addrs().len(), 3);
        assert_eq!(hosts[1].spec().address, "b");
    }
}
