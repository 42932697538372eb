//! Post-run sandbox check: pull every node's log and scan it.

use cloudfuzz_core::{SandboxFinding, SandboxScanner};
use cloudfuzz_types::NodeAddr;
use tracing::{info, warn};

use crate::host::RemoteHost;
use crate::remote::RemoteExec;

/// Findings across all nodes, plus nodes whose logs could not be read.
#[derive(Debug, Clone, Default)]
pub struct SandboxReport {
    /// Suspicious log lines.
    pub findings: Vec<SandboxFinding>,
    /// Nodes whose log could not be fetched, with the error.
    pub unreadable: Vec<(NodeAddr, String)>,
}

impl SandboxReport {
    /// True if every log was read and none had findings.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.unreadable.is_empty()
    }
}

/// Scan the logs of every worker the hosts still own.
pub async fn check_sandbox<E: RemoteExec>(
    hosts: &[RemoteHost<E>],
    scanner: &SandboxScanner,
) -> SandboxReport {
    let mut report = SandboxReport::default();
    for host in hosts {
        for handle in host.nodes() {
            match host.fetch_log(handle).await {
                Ok(log) => report
                    .findings
                    .extend(scanner.scan(&handle.addr.to_string(), &log)),
                Err(e) => {
                    warn!(node = %handle.addr, error = %e, "Could not read node log");
                    report.unreadable.push((handle.addr.clone(), e.to_string()));
                }
            }
        }
    }
    for finding in &report.findings {
        warn!(%finding, "Sandbox finding");
    }
    info!(
        findings = report.findings.len(),
        unreadable = report.unreadable.len(),
        "Sandbox check finished"
    );
    report
}
