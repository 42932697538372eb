//! One provisioned machine.
//!
//! [`RemoteHost`] uploads the worker artifact, launches worker processes on
//! assigned ports and owns their [`NodeHandle`]s until they are terminated.

use std::path::Path;
use std::time::SystemTime;

use cloudfuzz_types::{NodeAddr, NodeHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::remote::{RemoteError, RemoteExec};

/// Artifact transfer errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Local artifact path has no usable file name.
    #[error("invalid artifact path: {0}")]
    InvalidArtifact(String),

    /// Remote filesystem is full.
    #[error("no space left on {host}")]
    NoSpace {
        /// Target host.
        host: String,
    },

    /// Connectivity loss or other remote failure.
    #[error("transfer to {host} failed: {source}")]
    Remote {
        /// Target host.
        host: String,
        /// Underlying channel error.
        #[source]
        source: RemoteError,
    },
}

/// Worker launch errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Something already listens on the port.
    #[error("port {port} already in use on {host}")]
    PortInUse {
        /// Target host.
        host: String,
        /// Requested port.
        port: u16,
    },

    /// The remote command could not be started.
    #[error("failed to spawn worker on {host}:{port}: {reason}")]
    SpawnFailed {
        /// Target host.
        host: String,
        /// Requested port.
        port: u16,
        /// What went wrong.
        reason: String,
    },
}

/// Static description of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    /// Address nodes on this host bind and are reached at.
    pub address: String,
    /// Remote working directory for the artifact and node logs.
    pub workdir: String,
    /// Command prefix that runs the artifact, e.g. `java -Xmx1g -jar`.
    pub launcher: String,
    /// Workers to start on this host.
    pub node_count: u16,
    /// Port of the first worker.
    pub base_port: u16,
    /// Distance between consecutive workers' ports.
    pub port_stride: u16,
}

impl HostSpec {
    /// Spec with one worker on 54321 under `/tmp/cloudfuzz`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            workdir: "/tmp/cloudfuzz".into(),
            launcher: "java -Xmx1g -jar".into(),
            node_count: 1,
            base_port: 54321,
            port_stride: 3,
        }
    }

    /// Set the number of workers.
    pub fn with_nodes(mut self, node_count: u16) -> Self {
        self.node_count = node_count;
        self
    }

    /// Ports assigned to this host's workers: `base_port + i * port_stride`.
    pub fn ports(&self) -> Vec<u16> {
        (0..self.node_count)
            .map(|i| self.base_port.saturating_add(i.saturating_mul(self.port_stride)))
            .collect()
    }

    /// Addresses the workers will be reachable at.
    pub fn node_addrs(&self) -> Vec<NodeAddr> {
        self.ports()
            .into_iter()
            .map(|p| NodeAddr::new(self.address.clone(), p))
            .collect()
    }

    /// Remote log path for the worker on `port`.
    pub fn log_path(&self, port: u16) -> String {
        format!("{}/node-{port}.log", self.workdir)
    }
}

/// Shell snippet that prints `in-use` if something listens on `port`.
fn port_check_command(port: u16) -> String {
    format!(
        "if (ss -ltn 2>/dev/null || netstat -ltn 2>/dev/null) | grep -q ':{port} '; \
         then echo in-use; else echo free; fi"
    )
}

/// A machine driven over a remote channel.
///
/// Owns the handles of every worker it launched; they are released by
/// [`terminate`](Self::terminate) or [`teardown`](Self::teardown).
#[derive(Debug)]
pub struct RemoteHost<E: RemoteExec> {
    exec: E,
    spec: HostSpec,
    artifact: Option<String>,
    processes: Vec<NodeHandle>,
}

impl<E: RemoteExec> RemoteHost<E> {
    /// Wrap a channel with the host's spec.
    pub fn new(spec: HostSpec, exec: E) -> Self {
        Self {
            exec,
            spec,
            artifact: None,
            processes: Vec::new(),
        }
    }

    /// The host's spec.
    pub fn spec(&self) -> &HostSpec {
        &self.spec
    }

    /// Handles of workers still owned by this host.
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.processes
    }

    /// Remote path of the uploaded artifact, if any.
    pub fn artifact(&self) -> Option<&str> {
        self.artifact.as_deref()
    }

    /// Copy the artifact into the working directory (overwrites).
    pub async fn upload(&mut self, artifact_path: &Path) -> Result<(), TransferError> {
        let file_name = artifact_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::InvalidArtifact(artifact_path.display().to_string()))?;
        let remote_path = format!("{}/{file_name}", self.spec.workdir);

        self.exec
            .exec_ok(&format!("mkdir -p {}", self.spec.workdir))
            .await
            .map_err(|e| self.transfer_error(e))?;
        self.exec
            .copy_to(artifact_path, &remote_path)
            .await
            .map_err(|e| self.transfer_error(e))?;

        info!(host = %self.spec.address, artifact = %remote_path, "Uploaded artifact");
        self.artifact = Some(remote_path);
        Ok(())
    }

    fn transfer_error(&self, source: RemoteError) -> TransferError {
        let out_of_space = match &source {
            RemoteError::CopyFailed { reason, .. } => reason.contains("No space left"),
            RemoteError::CommandFailed { stderr, .. } => stderr.contains("No space left"),
            _ => false,
        };
        if out_of_space {
            TransferError::NoSpace {
                host: self.spec.address.clone(),
            }
        } else {
            TransferError::Remote {
                host: self.spec.address.clone(),
                source,
            }
        }
    }

    /// Start a worker bound to `port`, detached, logging to
    /// `<workdir>/node-<port>.log`. Returns once the process is spawned.
    pub async fn launch(&mut self, port: u16, extra_args: &[String]) -> Result<NodeHandle, LaunchError> {
        let host = self.spec.address.clone();
        let spawn_failed = |reason: String| LaunchError::SpawnFailed {
            host: host.clone(),
            port,
            reason,
        };

        let artifact = self
            .artifact
            .clone()
            .ok_or_else(|| spawn_failed("no artifact uploaded".into()))?;

        let check = self
            .exec
            .exec_ok(&port_check_command(port))
            .await
            .map_err(|e| spawn_failed(e.to_string()))?;
        if check.stdout.trim() == "in-use" {
            return Err(LaunchError::PortInUse {
                host: host.clone(),
                port,
            });
        }

        let log_path = self.spec.log_path(port);
        let mut args = vec![
            "-ip".to_string(),
            self.spec.address.clone(),
            "-port".to_string(),
            port.to_string(),
        ];
        args.extend(extra_args.iter().cloned());
        let cmd = format!(
            "cd {} && nohup {} {artifact} {} > {log_path} 2>&1 < /dev/null & echo $!",
            self.spec.workdir,
            self.spec.launcher,
            args.join(" "),
        );
        debug!(host = %host, %cmd, "Spawning worker");

        let output = self
            .exec
            .exec_ok(&cmd)
            .await
            .map_err(|e| spawn_failed(e.to_string()))?;
        let pid: u32 = output
            .stdout
            .trim()
            .parse()
            .map_err(|_| spawn_failed(format!("no pid in output {:?}", output.stdout)))?;

        let handle = NodeHandle {
            addr: NodeAddr::new(host.clone(), port),
            pid,
            log_path,
            launched_at: SystemTime::now(),
        };
        info!(node = %handle.addr, pid, "Launched worker");
        self.processes.push(handle.clone());
        Ok(handle)
    }

    /// Launch every worker in the spec, one after another.
    pub async fn launch_all(&mut self, extra_args: &[String]) -> Result<Vec<NodeHandle>, LaunchError> {
        let mut handles = Vec::new();
        for port in self.spec.ports() {
            handles.push(self.launch(port, extra_args).await?);
        }
        Ok(handles)
    }

    /// Kill a worker. Best-effort: failures are logged, never returned.
    pub async fn terminate(&mut self, handle: &NodeHandle) {
        self.processes.retain(|h| h.pid != handle.pid || h.addr != handle.addr);
        match self.exec.exec_ok(&format!("kill {}", handle.pid)).await {
            Ok(_) => debug!(node = %handle.addr, pid = handle.pid, "Terminated worker"),
            Err(e) => warn!(node = %handle.addr, pid = handle.pid, error = %e, "Terminate failed"),
        }
    }

    /// Terminate every worker this host still owns.
    pub async fn teardown(&mut self) {
        let handles = std::mem::take(&mut self.processes);
        for handle in &handles {
            self.terminate(handle).await;
        }
        info!(host = %self.spec.address, count = handles.len(), "Host torn down");
    }

    /// Read a worker's log back.
    pub async fn fetch_log(&self, handle: &NodeHandle) -> Result<String, RemoteError> {
        let output = self.exec.exec_ok(&format!("cat {}", handle.log_path)).await?;
        Ok(output.stdout)
    }
}
