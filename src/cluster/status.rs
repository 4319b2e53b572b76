//! Observed cluster status
//!
//! Status values are immutable snapshots: every query or deploy produces a
//! fresh one and the state machine driver reassigns explicitly. Nothing in
//! this module mutates a snapshot in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lifecycle state tag of a cluster, mirroring pod phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Unknown,
    Pending,
    Running,
    Failed,
    Succeeded,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unknown => "unknown",
            LifecycleState::Pending => "pending",
            LifecycleState::Running => "running",
            LifecycleState::Failed => "failed",
            LifecycleState::Succeeded => "succeeded",
        }
    }
}

/// Observed state of one cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Lifecycle state tag
    #[serde(default)]
    pub state: LifecycleState,

    /// Address clients connect to the scheduler at; absent means the
    /// cluster is not yet running
    #[serde(rename = "schedulerAddress")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler_address: Option<String>,

    /// Generated cluster name
    #[serde(rename = "clusterName")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Allocated ports by logical name ("scheduler", "dashboard"),
    /// populated only in NodePort mode
    #[serde(rename = "nodePorts")]
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub node_ports: HashMap<String, u16>,
}

impl ClusterStatus {
    /// Whether the cluster was observed running
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    /// Allocated node port by logical name
    pub fn node_port(&self, name: &str) -> Option<u16> {
        self.node_ports.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_not_running() {
        let status = ClusterStatus::default();
        assert!(!status.is_running());
        assert!(status.scheduler_address.is_none());
    }

    #[test]
    fn test_state_wire_format_is_lowercase() {
        let json = serde_json::to_string(&LifecycleState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let state: LifecycleState = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(state, LifecycleState::Pending);
    }

    #[test]
    fn test_status_roundtrip() {
        let mut node_ports = HashMap::new();
        node_ports.insert("scheduler".to_string(), 30100);
        node_ports.insert("dashboard".to_string(), 30101);

        let status = ClusterStatus {
            state: LifecycleState::Running,
            scheduler_address: Some("tcp://10.0.0.5:8786".to_string()),
            cluster_name: Some("dasklink-trainer-1a2b3c4d".to_string()),
            node_ports,
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("schedulerAddress"));

        let parsed: ClusterStatus = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_running());
        assert_eq!(parsed.node_port("scheduler"), Some(30100));
    }
}
