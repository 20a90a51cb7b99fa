//! Supervisor control signals.
//!
//! The supervisor's public surface is a single `handle_request` taking a
//! dynamic payload tagged by a `signal` field. The payload is modeled as a
//! tagged variant over the six signals, each carrying exactly the fields it
//! requires; malformed payloads are rejected at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::error::{FilamentError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "signal")]
pub enum SupervisorPayload {
    #[serde(rename = "NODE_CREATE")]
    NodeCreate {
        #[serde(default)]
        dependencies: Vec<String>,
    },
    #[serde(rename = "NODE_DELETE")]
    NodeDelete { id: String },
    #[serde(rename = "NODE_PAUSE")]
    NodePause { id: String },
    #[serde(rename = "NODE_DELAY")]
    NodeDelay { id: String, delay: u64 },
    #[serde(rename = "NODE_RUN")]
    NodeRun { id: String, data: Value },
    #[serde(rename = "NODE_SEND_DATA")]
    NodeSendData { id: String },
}

const KNOWN_SIGNALS: [&str; 6] = [
    "NODE_CREATE",
    "NODE_DELETE",
    "NODE_PAUSE",
    "NODE_DELAY",
    "NODE_RUN",
    "NODE_SEND_DATA",
];

impl SupervisorPayload {
    /// Parses a dynamic payload, distinguishing an unknown `signal` tag
    /// (`UnknownSignal`, warn-and-ignore territory) from a known signal with
    /// malformed fields (`InvalidSignal`, rejected).
    pub fn from_value(value: Value) -> Result<Self> {
        let signal = value
            .get("signal")
            .and_then(Value::as_str)
            .ok_or_else(|| FilamentError::InvalidSignal {
                signal: "<missing>".into(),
                cause: "payload has no signal tag".into(),
            })?;
        if !KNOWN_SIGNALS.contains(&signal) {
            return Err(FilamentError::UnknownSignal(signal.to_string()));
        }
        let signal = signal.to_string();
        serde_json::from_value(value).map_err(|e| FilamentError::InvalidSignal {
            signal,
            cause: e.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SupervisorPayload::NodeCreate { .. } => "NODE_CREATE",
            SupervisorPayload::NodeDelete { .. } => "NODE_DELETE",
            SupervisorPayload::NodePause { .. } => "NODE_PAUSE",
            SupervisorPayload::NodeDelay { .. } => "NODE_DELAY",
            SupervisorPayload::NodeRun { .. } => "NODE_RUN",
            SupervisorPayload::NodeSendData { .. } => "NODE_SEND_DATA",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_node_create_defaults() {
        let payload = SupervisorPayload::from_value(json!({"signal": "NODE_CREATE"})).unwrap();
        match payload {
            SupervisorPayload::NodeCreate { dependencies } => assert!(dependencies.is_empty()),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_parse_node_create_with_dependencies() {
        let payload = SupervisorPayload::from_value(
            json!({"signal": "NODE_CREATE", "dependencies": ["a", "b"]}),
        )
        .unwrap();
        match payload {
            SupervisorPayload::NodeCreate { dependencies } => {
                assert_eq!(dependencies, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_parse_node_run() {
        let payload =
            SupervisorPayload::from_value(json!({"signal": "NODE_RUN", "id": "n-1", "data": 3}))
                .unwrap();
        match payload {
            SupervisorPayload::NodeRun { id, data } => {
                assert_eq!(id, "n-1");
                assert_eq!(data, json!(3));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_signal() {
        let error = SupervisorPayload::from_value(json!({"signal": "bogus"})).unwrap_err();
        assert!(matches!(error, FilamentError::UnknownSignal(name) if name == "bogus"));
    }

    #[test]
    fn test_missing_signal_tag() {
        let error = SupervisorPayload::from_value(json!({"id": "n-1"})).unwrap_err();
        assert!(matches!(error, FilamentError::InvalidSignal { .. }));
    }

    #[test]
    fn test_known_signal_malformed_fields() {
        // NODE_DELAY requires both id and delay.
        let error =
            SupervisorPayload::from_value(json!({"signal": "NODE_DELAY", "id": "n-1"})).unwrap_err();
        assert!(matches!(error, FilamentError::InvalidSignal { signal, .. } if signal == "NODE_DELAY"));
    }

    #[test]
    fn test_signal_names_round_trip() {
        let payload = SupervisorPayload::NodeSendData { id: "n-1".into() };
        let wire = serde_json::to_value(&payload).unwrap();
        assert_eq!(wire["signal"], json!("NODE_SEND_DATA"));
        assert_eq!(payload.name(), "NODE_SEND_DATA");
    }
}
