//! Chain configuration and wire message types.
//!
//! Everything that crosses a peer boundary is defined here: the chain config
//! a caller hands to the supervisor, the per-stage setup broadcast, the data
//! hand-off payload and the per-node status report. Wire-facing structs use
//! camelCase field names.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle states of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Paused,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "PENDING",
            NodeStatus::InProgress => "IN_PROGRESS",
            NodeStatus::Completed => "COMPLETED",
            NodeStatus::Failed => "FAILED",
            NodeStatus::Paused => "PAUSED",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a stage's nodes are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Local,
    Remote,
}

/// A service entry as it appears in a chain config: either a bare id or an
/// object carrying resolver metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    Id(String),
    Target {
        #[serde(rename = "targetId")]
        target_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Value>,
    },
}

impl ServiceEntry {
    /// Normalizes the heterogeneous wire shape into one struct.
    pub fn normalize(&self) -> ServiceTarget {
        match self {
            ServiceEntry::Id(id) => ServiceTarget {
                target_id: id.clone(),
                meta: None,
            },
            ServiceEntry::Target { target_id, meta } => ServiceTarget {
                target_id: target_id.clone(),
                meta: meta.clone(),
            },
        }
    }
}

impl From<&str> for ServiceEntry {
    fn from(id: &str) -> Self {
        ServiceEntry::Id(id.to_string())
    }
}

/// Normalized service entry: downstream code only ever sees this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTarget {
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ServiceTarget {
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            meta: None,
        }
    }
}

/// A stage's service list as it travels in a setup broadcast. The stage
/// location is stripped: each recipient owns whichever stages its resolver
/// can place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageServices {
    pub services: Vec<ServiceEntry>,
}

impl StageServices {
    /// The stage's addressed service. Entries past the first are reserved
    /// for future fan-out.
    pub fn first_target(&self) -> Option<ServiceTarget> {
        self.services.first().map(ServiceEntry::normalize)
    }

    pub fn targets(&self) -> Vec<ServiceTarget> {
        self.services.iter().map(ServiceEntry::normalize).collect()
    }
}

/// One position in a chain's ordered config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub services: Vec<ServiceEntry>,
    pub location: Location,
}

impl StageConfig {
    pub fn first_target(&self) -> Option<ServiceTarget> {
        self.services.first().map(ServiceEntry::normalize)
    }

    /// The stage config with its location stripped, as broadcast to peers.
    pub fn stripped(&self) -> StageServices {
        StageServices {
            services: self.services.clone(),
        }
    }
}

/// The node-creation broadcast handed to the setup-broadcast callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSetupMessage {
    pub signal: String,
    pub chain: ChainDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_host: Option<String>,
}

/// Signal tag carried by a setup broadcast.
pub const SETUP_SIGNAL: &str = "NODE_CREATE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub id: String,
    pub config: Vec<StageServices>,
}

/// Per-stage setup body (`POST <peer><setup>`).
///
/// `monitoringHost` propagates the chain's monitoring peer so recipients can
/// route their reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub chain_id: String,
    pub remote_configs: StageServices,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_host: Option<String>,
}

/// Data hand-off body (`POST <peer><run>`), also the payload the supervisor's
/// delivery callback receives from `send_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    pub data: Value,
}

/// Per-node status report (`POST <monHost><notify>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    pub node_id: String,
    pub status: NodeStatus,
    pub timestamp: u64,
}

impl ReportingMessage {
    pub fn new(chain_id: Option<String>, node_id: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            chain_id,
            node_id: node_id.into(),
            status,
            timestamp: unix_millis(),
        }
    }
}

/// Aggregate view of a chain: three disjoint buckets of node ids. Nodes that
/// are `PAUSED` or `IN_PROGRESS` appear in none of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    pub completed: BTreeSet<String>,
    pub pending: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

/// URL path components appended to resolved peer hosts.
#[derive(Debug, Clone)]
pub struct Paths {
    pub setup: String,
    pub run: String,
    pub notify: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            setup: "/chain/setup".into(),
            run: "/chain/run".into(),
            notify: "/chain/notify".into(),
        }
    }
}

/// Milliseconds since the unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_status_wire_names() {
        assert_eq!(serde_json::to_value(NodeStatus::Pending).unwrap(), json!("PENDING"));
        assert_eq!(
            serde_json::to_value(NodeStatus::InProgress).unwrap(),
            json!("IN_PROGRESS")
        );
        let status: NodeStatus = serde_json::from_value(json!("FAILED")).unwrap();
        assert_eq!(status, NodeStatus::Failed);
    }

    #[test]
    fn test_node_status_terminality() {
        assert!(NodeStatus::Completed.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(!NodeStatus::Pending.is_terminal());
        assert!(!NodeStatus::InProgress.is_terminal());
        assert!(!NodeStatus::Paused.is_terminal());
    }

    #[test]
    fn test_service_entry_bare_id() {
        let entry: ServiceEntry = serde_json::from_value(json!("svc-a")).unwrap();
        let target = entry.normalize();
        assert_eq!(target.target_id, "svc-a");
        assert!(target.meta.is_none());
    }

    #[test]
    fn test_service_entry_object() {
        let entry: ServiceEntry =
            serde_json::from_value(json!({"targetId": "svc-b", "meta": {"zone": "eu"}})).unwrap();
        let target = entry.normalize();
        assert_eq!(target.target_id, "svc-b");
        assert_eq!(target.meta, Some(json!({"zone": "eu"})));
    }

    #[test]
    fn test_stage_config_deserialization() {
        let stage: StageConfig = serde_json::from_value(json!({
            "services": ["svc-a", {"targetId": "svc-b"}],
            "location": "remote"
        }))
        .unwrap();
        assert_eq!(stage.location, Location::Remote);
        assert_eq!(stage.first_target().unwrap().target_id, "svc-a");
        assert_eq!(stage.stripped().targets().len(), 2);
    }

    #[test]
    fn test_setup_message_wire_shape() {
        let message = SetupMessage {
            chain_id: "ci-1-deadbeef".into(),
            remote_configs: StageServices {
                services: vec!["svc-b".into()],
            },
            monitoring_host: None,
        };
        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(wire["chainId"], json!("ci-1-deadbeef"));
        assert_eq!(wire["remoteConfigs"]["services"], json!(["svc-b"]));
        assert!(wire.get("monitoringHost").is_none());
    }

    #[test]
    fn test_run_message_optional_fields() {
        let message: RunMessage =
            serde_json::from_value(json!({"targetId": "svc-b", "data": 42})).unwrap();
        assert!(message.chain_id.is_none());
        assert!(message.meta.is_none());
        assert_eq!(message.data, json!(42));
    }

    #[test]
    fn test_reporting_message_round_trip() {
        let message = ReportingMessage::new(Some("c-1".into()), "n-1", NodeStatus::Completed);
        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(wire["chainId"], json!("c-1"));
        assert_eq!(wire["nodeId"], json!("n-1"));
        assert_eq!(wire["status"], json!("COMPLETED"));
        let back: ReportingMessage = serde_json::from_value(wire).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_default_paths() {
        let paths = Paths::default();
        assert_eq!(paths.setup, "/chain/setup");
        assert_eq!(paths.run, "/chain/run");
        assert_eq!(paths.notify, "/chain/notify");
    }
}
