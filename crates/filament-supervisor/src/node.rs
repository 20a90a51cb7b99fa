//! The node state machine.
//!
//! A node is the local materialization of a chain stage: an ordered pipeline
//! of processors plus a status, an execution delay, advisory dependencies and
//! the last produced output. Nodes are serial actors: all state lives behind
//! one async mutex, so per-node transitions are strictly ordered while the
//! supervisor's control loop stays free to run other nodes.
//!
//! Status lattice:
//!
//! ```text
//! PENDING -> IN_PROGRESS -> COMPLETED | FAILED
//! PENDING | IN_PROGRESS -> PAUSED -> PENDING
//! PENDING -> FAILED            (unmet dependencies)
//! ```
//!
//! Dependency *resolution* is the supervisor's job; the node only stores the
//! id set (see [`crate::supervisor::Supervisor::run_node`]).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use filament_common::{FilamentError, NodeStatus, Result, RunMessage, ServiceTarget};

use crate::callbacks::DataDelivery;
use crate::processor::BoxedProcessor;

/// Receives every committed status change of a node. The supervisor installs
/// its monitoring here so reports flow without the node knowing about
/// monitoring at all.
pub trait StatusObserver: Send + Sync {
    fn status_changed(&self, node_id: &str, chain_id: Option<&str>, status: NodeStatus);
}

pub struct Node {
    id: String,
    state: Mutex<NodeState>,
    observer: Option<Arc<dyn StatusObserver>>,
}

struct NodeState {
    status: NodeStatus,
    chain_id: Option<String>,
    pipeline: Vec<BoxedProcessor>,
    dependencies: BTreeSet<String>,
    delay_ms: u64,
    output: Option<Value>,
    next_target: Option<ServiceTarget>,
}

fn transition_is_legal(from: NodeStatus, to: NodeStatus) -> bool {
    use NodeStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress)
            | (Pending, Paused)
            | (Pending, Failed)
            | (InProgress, Completed)
            | (InProgress, Failed)
            | (InProgress, Paused)
            | (Paused, Pending)
    )
}

impl Node {
    /// Creates a node in `PENDING` with an empty pipeline.
    pub fn new(
        id: impl Into<String>,
        dependencies: Vec<String>,
        chain_id: Option<String>,
        observer: Option<Arc<dyn StatusObserver>>,
    ) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(NodeState {
                status: NodeStatus::Pending,
                chain_id,
                pipeline: Vec::new(),
                dependencies: dependencies.into_iter().collect(),
                delay_ms: 0,
                output: None,
                next_target: None,
            }),
            observer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn status(&self) -> NodeStatus {
        self.state.lock().await.status
    }

    pub async fn chain_id(&self) -> Option<String> {
        self.state.lock().await.chain_id.clone()
    }

    pub async fn dependencies(&self) -> BTreeSet<String> {
        self.state.lock().await.dependencies.clone()
    }

    /// Last payload produced by the pipeline, until `send_data` consumes it.
    pub async fn output(&self) -> Option<Value> {
        self.state.lock().await.output.clone()
    }

    /// Stores the per-execution delay; takes effect at the next `execute`.
    pub async fn set_delay(&self, delay_ms: u64) {
        self.state.lock().await.delay_ms = delay_ms;
    }

    /// Designates where `send_data` forwards output. Terminal nodes leave
    /// this unset.
    pub async fn set_next_target(&self, target: ServiceTarget) {
        self.state.lock().await.next_target = Some(target);
    }

    pub async fn next_target(&self) -> Option<ServiceTarget> {
        self.state.lock().await.next_target.clone()
    }

    /// Extends the pipeline; permitted only while `PENDING` or `PAUSED`.
    pub async fn append_pipeline(&self, processors: Vec<BoxedProcessor>) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.status {
            NodeStatus::Pending | NodeStatus::Paused => {
                state.pipeline.extend(processors);
                Ok(())
            }
            status => Err(FilamentError::InvalidTransition {
                from: status,
                to: status,
            }),
        }
    }

    /// Applies a status transition, enforcing the lattice. Pausing an
    /// already-paused node is a no-op.
    pub async fn update_status(&self, to: NodeStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.status == NodeStatus::Paused && to == NodeStatus::Paused {
            debug!(node = %self.id, "node already paused");
            return Ok(());
        }
        self.transition(&mut state, to)
    }

    fn transition(&self, state: &mut NodeState, to: NodeStatus) -> Result<()> {
        if !transition_is_legal(state.status, to) {
            return Err(FilamentError::InvalidTransition {
                from: state.status,
                to,
            });
        }
        state.status = to;
        if let Some(observer) = &self.observer {
            observer.status_changed(&self.id, state.chain_id.as_deref(), to);
        }
        Ok(())
    }

    /// Runs the pipeline over `input`.
    ///
    /// Sleeps the configured delay, moves `PENDING -> IN_PROGRESS`, feeds
    /// each processor the previous one's output, stores the final value and
    /// moves to `COMPLETED`. A processor error moves the node to `FAILED` and
    /// surfaces as `ProcessingFailed` with the zero-based stage index.
    ///
    /// A node that is not `PENDING` refuses to execute (pause is
    /// cooperative: it takes effect between executions, never mid-pipeline).
    pub async fn execute(&self, input: Value) -> Result<Value> {
        let mut state = self.state.lock().await;
        if state.status != NodeStatus::Pending {
            return Err(FilamentError::InvalidTransition {
                from: state.status,
                to: NodeStatus::InProgress,
            });
        }

        let delay_ms = state.delay_ms;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        self.transition(&mut state, NodeStatus::InProgress)?;

        let mut payload = input;
        for stage_index in 0..state.pipeline.len() {
            let result = state.pipeline[stage_index].run(payload);
            match result {
                Ok(next) => payload = next,
                Err(cause) => {
                    let failure = FilamentError::ProcessingFailed {
                        node_id: self.id.clone(),
                        stage_index,
                        cause,
                    };
                    self.transition(&mut state, NodeStatus::Failed)?;
                    return Err(failure);
                }
            }
        }

        state.output = Some(payload.clone());
        self.transition(&mut state, NodeStatus::Completed)?;
        Ok(payload)
    }

    /// Marks the node `FAILED` without running the pipeline. Used by the
    /// supervisor when dependencies are unmet.
    pub async fn fail(&self) -> Result<()> {
        self.update_status(NodeStatus::Failed).await
    }

    /// Hands the retained output to the delivery callback and clears it on
    /// success. Requires `COMPLETED` with output present; a delivery failure
    /// leaves both the status and the output untouched so the caller can
    /// retry.
    pub async fn send_data(&self, delivery: &dyn DataDelivery) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.status != NodeStatus::Completed || state.output.is_none() {
            return Err(FilamentError::NoOutput(self.id.clone()));
        }
        let target = state.next_target.clone().ok_or_else(|| {
            FilamentError::NoNextConnector(format!("node {} has no downstream target", self.id))
        })?;
        let data = state.output.clone().unwrap_or(Value::Null);
        let message = RunMessage {
            chain_id: state.chain_id.clone(),
            target_id: target.target_id,
            meta: target.meta,
            data,
        };

        delivery.deliver(&message).await?;
        state.output = None;
        Ok(())
    }
}
