//! Mock remote host for testing.
//!
//! Records every command and copy, answers commands from substring rules,
//! and hands out increasing PIDs for backgrounded launches.

use super::{ExecOutput, RemoteError, RemoteExec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// First PID handed out for `... & echo $!` commands.
const FIRST_PID: u32 = 4100;

/// Mock remote host for testing.
///
/// Clones share state. A command is answered by the first rule whose
/// pattern it contains; otherwise a backgrounded launch (`echo $!`) gets the
/// next PID and anything else succeeds with empty output.
#[derive(Debug)]
pub struct MockRemote {
    host: String,
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    rules: Vec<(String, ExecOutput)>,
    commands: Vec<String>,
    copies: Vec<(PathBuf, String)>,
    next_pid: u32,
    unreachable: bool,
    fail_next_exec: Option<String>,
    fail_next_copy: Option<String>,
}

impl MockRemote {
    /// Create a mock for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            inner: Arc::new(Mutex::new(MockRemoteInner {
                next_pid: FIRST_PID,
                ..MockRemoteInner::default()
            })),
        }
    }

    /// Answer commands containing `pattern` with `output`.
    pub fn respond(&self, pattern: &str, output: ExecOutput) {
        let mut inner = self.inner.lock().unwrap();
        inner.rules.push((pattern.to_string(), output));
    }

    /// Make every call fail as if ssh could not connect.
    pub fn set_unreachable(&self, unreachable: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.unreachable = unreachable;
    }

    /// Cause the next `exec()` to fail with the given stderr and exit 1.
    pub fn fail_next_exec(&self, stderr: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_exec = Some(stderr.to_string());
    }

    /// Cause the next `copy_to()` to fail with the given reason.
    pub fn fail_next_copy(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_copy = Some(reason.to_string());
    }

    /// Commands run so far.
    pub fn commands(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.commands.clone()
    }

    /// Commands containing `pattern`.
    pub fn commands_matching(&self, pattern: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(pattern))
            .collect()
    }

    /// Files copied so far, as (local, remote).
    pub fn copies(&self) -> Vec<(PathBuf, String)> {
        let inner = self.inner.lock().unwrap();
        inner.copies.clone()
    }
}

impl Clone for MockRemote {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl RemoteExec for MockRemote {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, cmd: &str) -> Result<ExecOutput, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.commands.push(cmd.to_string());

        if inner.unreachable {
            return Err(RemoteError::Unreachable {
                host: self.host.clone(),
                reason: "Connection refused".into(),
            });
        }

        if let Some(stderr) = inner.fail_next_exec.take() {
            return Ok(ExecOutput {
                stdout: String::new(),
                stderr,
                exit_code: 1,
            });
        }

        if let Some((_, output)) = inner.rules.iter().find(|(p, _)| cmd.contains(p.as_str())) {
            return Ok(output.clone());
        }

        if cmd.contains("echo $!") {
            let pid = inner.next_pid;
            inner.next_pid += 1;
            return Ok(ExecOutput::ok(format!("{pid}\n")));
        }

        Ok(ExecOutput::default())
    }

    async fn copy_to(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.unreachable {
            return Err(RemoteError::Unreachable {
                host: self.host.clone(),
                reason: "Connection refused".into(),
            });
        }

        if let Some(reason) = inner.fail_next_copy.take() {
            return Err(RemoteError::CopyFailed {
                host: self.host.clone(),
                reason,
            });
        }

        inner.copies.push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }
}
