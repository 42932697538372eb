//! Provisioned node handles and the stabilized cluster.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::NodeAddr;

/// Reference to one running worker process.
///
/// Created by a remote host when it launches a node and owned by that host;
/// the [`Cluster`] only refers to nodes by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHandle {
    /// Address the node was asked to bind.
    pub addr: NodeAddr,
    /// Remote process id, used for termination.
    pub pid: u32,
    /// Remote path the node's stdout/stderr are redirected to.
    pub log_path: String,
    /// When the process was spawned.
    pub launched_at: SystemTime,
}

/// A stabilized cloud: the leader's view of its members.
///
/// Immutable after stabilization and passed explicitly to every
/// orchestration call. Only [`Cluster::from_report`] constructs one, so a
/// cluster is never empty; it serializes for reports but cannot be
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    nodes: Vec<NodeAddr>,
    expected_size: usize,
    cloud_name: Option<String>,
}

impl Cluster {
    /// Build a cluster from the leader's reported members.
    ///
    /// The report is authoritative: members are kept as reported, with the
    /// polled `leader` moved to the front when it appears in the report.
    /// Returns `None` when the member count does not equal `expected_size`.
    pub fn from_report(
        leader: &NodeAddr,
        members: Vec<NodeAddr>,
        expected_size: usize,
        cloud_name: Option<String>,
    ) -> Option<Self> {
        let mut nodes = members;
        if nodes.len() != expected_size || nodes.is_empty() {
            return None;
        }
        if let Some(pos) = nodes.iter().position(|n| n == leader) {
            let l = nodes.remove(pos);
            nodes.insert(0, l);
        }
        Some(Self {
            nodes,
            expected_size,
            cloud_name,
        })
    }

    /// The coordination node (first member).
    pub fn leader(&self) -> &NodeAddr {
        &self.nodes[0]
    }

    /// All members, leader first.
    pub fn nodes(&self) -> &[NodeAddr] {
        &self.nodes
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a stabilized cluster; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Size the cluster was stabilized against.
    pub fn expected_size(&self) -> usize {
        self.expected_size
    }

    /// Cloud name as reported by the leader, if any.
    pub fn cloud_name(&self) -> Option<&str> {
        self.cloud_name.as_deref()
    }
}
