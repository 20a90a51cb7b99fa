use thiserror::Error;

use crate::protocol::messages::NodeStatus;

#[derive(Error, Debug)]
pub enum FilamentError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: NodeStatus, to: NodeStatus },

    #[error("dependencies not met: {0:?}")]
    DependenciesNotMet(Vec<String>),

    #[error("processing failed on node {node_id} at stage {stage_index}: {cause}")]
    ProcessingFailed {
        node_id: String,
        stage_index: usize,
        cause: String,
    },

    #[error("node {0} has no output to send")]
    NoOutput(String),

    #[error("no connector resolves target {0}")]
    NoNextConnector(String),

    #[error("data hand-off payload is missing a chain id")]
    MissingChainId,

    #[error("chain setup broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("setup POST to {peer} failed: {cause}")]
    SetupPostFailed { peer: String, cause: String },

    #[error("no monitoring host registered for chain {0}")]
    MonitoringNotFound(String),

    #[error("unknown supervisor signal: {0}")]
    UnknownSignal(String),

    #[error("invalid {signal} payload: {cause}")]
    InvalidSignal { signal: String, cause: String },

    #[error("unknown node: {0}")]
    NodeNotFound(String),

    #[error("unknown stage index: {0}")]
    StageNotFound(usize),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FilamentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let error = FilamentError::InvalidTransition {
            from: NodeStatus::Completed,
            to: NodeStatus::Pending,
        };
        assert_eq!(
            error.to_string(),
            "invalid status transition: COMPLETED -> PENDING"
        );
    }

    #[test]
    fn test_processing_failed_message() {
        let error = FilamentError::ProcessingFailed {
            node_id: "ci-n1".into(),
            stage_index: 2,
            cause: "boom".into(),
        };
        assert!(error.to_string().contains("ci-n1"));
        assert!(error.to_string().contains("stage 2"));
        assert!(error.to_string().contains("boom"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: FilamentError = parse_error.into();
        assert!(matches!(error, FilamentError::Json(_)));
    }
}
