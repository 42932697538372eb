//! ssh/scp via `tokio::process::Command`.
//!
//! Key-based auth must already be set up; `BatchMode=yes` makes a missing
//! key fail fast instead of prompting.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{ExecOutput, RemoteError, RemoteExec};

/// Exit code ssh reserves for its own (connection/auth) failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// SSH channel to one host.
#[derive(Debug, Clone)]
pub struct SshExec {
    host: String,
    user: String,
    identity: Option<PathBuf>,
    connect_timeout_secs: u64,
}

impl SshExec {
    /// Channel to `user@host` with default options.
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            identity: None,
            connect_timeout_secs: 30,
        }
    }

    /// Authenticate with a specific private key.
    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// `user@host`.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Options shared by ssh and scp.
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }
}

#[async_trait]
impl RemoteExec for SshExec {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, cmd: &str) -> Result<ExecOutput, RemoteError> {
        let output = tokio::process::Command::new("ssh")
            .args(self.common_args())
            .arg(self.destination())
            .arg(cmd)
            .output()
            .await?;

        let result = ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        if result.exit_code == SSH_CONNECTION_FAILURE {
            return Err(RemoteError::Unreachable {
                host: self.host.clone(),
                reason: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    async fn copy_to(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let output = tokio::process::Command::new("scp")
            .args(self.common_args())
            .arg(local)
            .arg(format!("{}:{}", self.destination(), remote))
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemoteError::CopyFailed {
                host: self.host.clone(),
                reason: format!("scp {} -> {remote}: {}", local.display(), stderr.trim()),
            });
        }

        Ok(())
    }
}
