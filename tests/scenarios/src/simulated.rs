//! In-process simulated cloud.
//!
//! Hosts are [`MockRemote`]s and the leader is a [`MockClusterApi`] fed a
//! staged sequence of cloud statuses, so the whole provision, stabilize and
//! dispatch path runs without a network.

use std::path::Path;

use cloudfuzz_client::{
    leader_of, provision, teardown_all, ExecOutput, HostSpec, MockClusterApi, MockRemote,
    ProvisionError, RemoteHost,
};
use cloudfuzz_types::{CloudStatus, Cluster, NodeAddr};

/// Artifact path handed to `provision`. Never read: uploads go to the mock.
pub const ARTIFACT: &str = "target/worker.jar";

/// Name the fake leader reports for its cloud.
pub const CLOUD_NAME: &str = "simulated";

/// Address of the `i`th simulated host.
pub fn host_address(i: usize) -> String {
    format!("10.0.0.{}", i + 1)
}

/// A cloud of mock hosts and a fake leader.
pub struct SimulatedCloud {
    /// Handles onto each host's mock channel (shared with `hosts`).
    pub remotes: Vec<MockRemote>,
    /// Hosts to provision.
    pub hosts: Vec<RemoteHost<MockRemote>>,
    /// The fake leader's API (clones share state).
    pub api: MockClusterApi,
}

impl SimulatedCloud {
    /// `host_count` hosts with `nodes_per_host` workers each.
    pub fn new(host_count: usize, nodes_per_host: u16) -> Self {
        let remotes: Vec<MockRemote> = (0..host_count)
            .map(|i| MockRemote::new(host_address(i)))
            .collect();
        let hosts = remotes
            .iter()
            .enumerate()
            .map(|(i, remote)| {
                RemoteHost::new(
                    HostSpec::new(host_address(i)).with_nodes(nodes_per_host),
                    remote.clone(),
                )
            })
            .collect();
        Self {
            remotes,
            hosts,
            api: MockClusterApi::new(),
        }
    }

    /// Every worker address the hosts will launch, host by host.
    pub fn members(&self) -> Vec<NodeAddr> {
        self.hosts
            .iter()
            .flat_map(|h| h.spec().node_addrs())
            .collect()
    }

    /// Number of workers across all hosts.
    pub fn size(&self) -> usize {
        self.members().len()
    }

    /// First worker of the first host.
    pub fn leader(&self) -> Option<NodeAddr> {
        self.members().into_iter().next()
    }

    /// Leader reports a growing partial cloud for `polls` polls, then the
    /// full membership on every poll after.
    pub fn form_after(&self, polls: usize) {
        let members = self.members();
        for i in 0..polls {
            let visible = ((i + 1) * members.len() / (polls + 1)).max(1);
            self.api.queue_cloud_status(status(&members[..visible]));
        }
        self.api.queue_cloud_status(status(&members));
    }

    /// Leader reports only the first `visible` members, forever.
    pub fn stall_at(&self, visible: usize) {
        let members = self.members();
        self.api
            .queue_cloud_status(status(&members[..visible.min(members.len())]));
    }

    /// The cluster a fully formed cloud stabilizes to.
    pub fn formed(&self) -> Option<Cluster> {
        let leader = self.leader()?;
        Cluster::from_report(&leader, self.members(), self.size(), Some(CLOUD_NAME.into()))
    }

    /// Make the worker on `port` of host `host_index` log `text`.
    pub fn seed_log(&self, host_index: usize, port: u16, text: &str) {
        let path = self.hosts[host_index].spec().log_path(port);
        self.remotes[host_index].respond(&format!("cat {path}"), ExecOutput::ok(text));
    }

    /// Upload the artifact and launch every worker.
    pub async fn provision(&mut self) -> Result<(), ProvisionError> {
        provision(&mut self.hosts, Path::new(ARTIFACT), &[]).await?;
        Ok(())
    }

    /// Leader as seen by the provisioned hosts.
    pub fn provisioned_leader(&self) -> Option<NodeAddr> {
        leader_of(&self.hosts)
    }

    /// Kill every worker.
    pub async fn teardown(&mut self) {
        teardown_all(&mut self.hosts).await;
    }

    /// `kill` commands sent to host `host_index`.
    pub fn kills(&self, host_index: usize) -> usize {
        self.remotes[host_index].commands_matching("kill ").len()
    }
}

fn status(members: &[NodeAddr]) -> CloudStatus {
    CloudStatus {
        cloud_name: Some(CLOUD_NAME.into()),
        cloud_size: members.len(),
        nodes: members.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudfuzz_client::ClusterApi;

    #[test]
    fn members_follow_host_specs() {
        let cloud = SimulatedCloud::new(2, 2);
        assert_eq!(
            cloud.members(),
            vec![
                NodeAddr::new("10.0.0.1", 54321),
                NodeAddr::new("10.0.0.1", 54324),
                NodeAddr::new("10.0.0.2", 54321),
                NodeAddr::new("10.0.0.2", 54324),
            ]
        );
        assert_eq!(cloud.formed().map(|c| c.len()), Some(4));
    }

    #[tokio::test]
    async fn form_after_grows_then_holds() {
        let cloud = SimulatedCloud::new(2, 2);
        cloud.form_after(3);
        let leader = cloud.leader().unwrap();

        let mut sizes = Vec::new();
        for _ in 0..6 {
            sizes.push(cloud.api.cloud_status(&leader).await.unwrap().cloud_size);
        }
        assert_eq!(sizes, vec![1, 2, 3, 4, 4, 4]);
    }
}
