//! Remote execution channel.
//!
//! A host is driven through two primitives: run a shell command, copy a
//! file to it. [`SshExec`] shells out to `ssh`/`scp`; [`MockRemote`]
//! simulates a host for tests.

mod mock;
mod ssh;

pub use mock::MockRemote;
pub use ssh::SshExec;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from the remote channel.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Local ssh/scp process could not be started.
    #[error("ssh spawn error: {0}")]
    Spawn(#[from] std::io::Error),

    /// ssh could not reach or authenticate to the host.
    #[error("host {host} unreachable: {reason}")]
    Unreachable {
        /// Target host.
        host: String,
        /// ssh's own diagnostic.
        reason: String,
    },

    /// Remote command returned non-zero exit code.
    #[error("command failed on {host}: exit={exit_code}, stderr={stderr}")]
    CommandFailed {
        /// Target host.
        host: String,
        /// Exit code.
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// File copy failed.
    #[error("copy to {host} failed: {reason}")]
    CopyFailed {
        /// Target host.
        host: String,
        /// scp's diagnostic.
        reason: String,
    },
}

/// Result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (0 = success).
    pub exit_code: i32,
}

impl ExecOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A command channel to one host.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Host this channel targets (for logs and errors).
    fn host(&self) -> &str;

    /// Run `cmd` in a remote shell.
    ///
    /// Does NOT fail on non-zero exit; use [`exec_ok`](Self::exec_ok) for that.
    async fn exec(&self, cmd: &str) -> Result<ExecOutput, RemoteError>;

    /// Copy a local file to `remote` path, overwriting it.
    async fn copy_to(&self, local: &Path, remote: &str) -> Result<(), RemoteError>;

    /// Run `cmd`, failing on non-zero exit.
    async fn exec_ok(&self, cmd: &str) -> Result<ExecOutput, RemoteError> {
        let output = self.exec(cmd).await?;
        if !output.success() {
            return Err(RemoteError::CommandFailed {
                host: self.host().to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}
