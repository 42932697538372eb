//! Bringing up workers across several hosts.
//!
//! Hosts are provisioned in parallel; workers within one host are launched
//! one after another.

use std::path::Path;

use cloudfuzz_types::{NodeAddr, NodeHandle};
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::host::{LaunchError, RemoteHost, TransferError};
use crate::remote::RemoteExec;

/// Provisioning errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No hosts were configured.
    #[error("no hosts to provision")]
    NoHosts,

    /// Artifact upload failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Worker launch failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

async fn provision_host<E: RemoteExec>(
    host: &mut RemoteHost<E>,
    artifact: &Path,
    extra_args: &[String],
) -> Result<Vec<NodeHandle>, ProvisionError> {
    host.upload(artifact).await?;
    Ok(host.launch_all(extra_args).await?)
}

/// Upload `artifact` to every host and launch each host's workers.
///
/// On any failure every host is torn down and the first error returned, so
/// a half-started cloud is never left running.
pub async fn provision<E: RemoteExec>(
    hosts: &mut [RemoteHost<E>],
    artifact: &Path,
    extra_args: &[String],
) -> Result<Vec<NodeHandle>, ProvisionError> {
    if hosts.is_empty() {
        return Err(ProvisionError::NoHosts);
    }

    let results = join_all(
        hosts
            .iter_mut()
            .map(|host| provision_host(host, artifact, extra_args)),
    )
    .await;

    let mut handles = Vec::new();
    let mut first_error = None;
    for result in results {
        match result {
            Ok(mut launched) => handles.append(&mut launched),
            Err(e) => {
                warn!(error = %e, "Provisioning failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        teardown_all(hosts).await;
        return Err(e);
    }

    info!(hosts = hosts.len(), nodes = handles.len(), "Provisioned cloud");
    Ok(handles)
}

/// Tear down every host in parallel. Best-effort.
pub async fn teardown_all<E: RemoteExec>(hosts: &mut [RemoteHost<E>]) {
    join_all(hosts.iter_mut().map(|host| host.teardown())).await;
}

/// Node to poll for cloud status: the first worker of the first host.
pub fn leader_of<E: RemoteExec>(hosts: &[RemoteHost<E>]) -> Option<NodeAddr> {
    hosts
        .iter()
        .flat_map(|h| h.spec().node_addrs())
        .next()
}

/// Workers all hosts will start in total.
pub fn expected_size<E: RemoteExec>(hosts: &[RemoteHost<E>]) -> usize {
    hosts.iter().map(|h| h.spec().node_count as usize).sum()
}
