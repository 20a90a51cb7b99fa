//! The supervisor: one per process, sole owner of its nodes.
//!
//! The supervisor dispatches the six `NODE_*` control signals, turns a chain
//! config into local nodes plus a setup broadcast for remote stages, places
//! inbound stages received from other initiators, and routes run requests to
//! the node owning a target service.
//!
//! Signals are processed sequentially with respect to state mutation; I/O
//! (delays, HTTP) overlaps because each node serializes only its own
//! transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use filament_common::{
    BroadcastSetupMessage, ChainDescriptor, FilamentError, Location, NodeStatus, Result,
    RunMessage, ServiceTarget, SetupMessage, StageConfig, SupervisorPayload, SETUP_SIGNAL,
};

use crate::agent::MonitoringAgent;
use crate::callbacks::SupervisorCallbacks;
use crate::chain::allocate_chain_id;
use crate::monitoring::NodeMonitoring;
use crate::node::Node;
use crate::processor::BoxedProcessor;

/// The chain this supervisor initiated, if any. Stage indexes map to the
/// local node created for that stage so processors and downstream targets
/// can be installed by position.
struct ActiveChain {
    chain_id: String,
    stage_nodes: HashMap<usize, String>,
}

/// Result of driving a placed service through execute + hand-off.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub node_id: String,
    pub status: NodeStatus,
    /// Whether output was handed to a downstream peer.
    pub forwarded: bool,
}

pub struct Supervisor {
    uid: String,
    public_url: Option<String>,
    nodes: RwLock<HashMap<String, Arc<Node>>>,
    /// `(chain id, target id) -> node id` for inbound run dispatch.
    placements: RwLock<HashMap<(String, String), String>>,
    chain: RwLock<Option<ActiveChain>>,
    next_node_seq: AtomicU64,
    monitoring: Arc<NodeMonitoring>,
    agent: Arc<MonitoringAgent>,
    callbacks: SupervisorCallbacks,
}

impl Supervisor {
    /// Creates a supervisor with its callback set and the process-local
    /// monitoring agent. Callbacks are fixed for the supervisor's lifetime.
    pub fn new(
        uid: impl Into<String>,
        callbacks: SupervisorCallbacks,
        agent: Arc<MonitoringAgent>,
    ) -> Self {
        let monitoring = Arc::new(NodeMonitoring::new(callbacks.reporting.clone()));
        Self {
            uid: uid.into(),
            public_url: None,
            nodes: RwLock::new(HashMap::new()),
            placements: RwLock::new(HashMap::new()),
            chain: RwLock::new(None),
            next_node_seq: AtomicU64::new(1),
            monitoring,
            agent,
            callbacks,
        }
    }

    /// The URL other peers reach this connector at. Required for initiating
    /// chains whose reports should route back here.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn monitoring(&self) -> &Arc<NodeMonitoring> {
        &self.monitoring
    }

    pub fn agent(&self) -> &Arc<MonitoringAgent> {
        &self.agent
    }

    pub async fn node(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.read().await.get(id).cloned()
    }

    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Ids of every node this supervisor owns.
    pub async fn node_ids(&self) -> Vec<String> {
        self.nodes.read().await.keys().cloned().collect()
    }

    /// Handles a dynamic control payload. Unknown signals are logged and
    /// ignored without touching any node; malformed payloads for known
    /// signals are rejected.
    pub async fn handle_request(&self, payload: Value) -> Result<Value> {
        match SupervisorPayload::from_value(payload) {
            Ok(payload) => self.handle(payload).await,
            Err(FilamentError::UnknownSignal(signal)) => {
                warn!(%signal, "ignoring unknown supervisor signal");
                Ok(Value::Null)
            }
            Err(error) => Err(error),
        }
    }

    /// Dispatches one typed control signal.
    pub async fn handle(&self, payload: SupervisorPayload) -> Result<Value> {
        debug!(signal = payload.name(), "handling supervisor signal");
        match payload {
            SupervisorPayload::NodeCreate { dependencies } => {
                let node = self.create_node(dependencies, None).await;
                Ok(json!({ "id": node.id() }))
            }
            SupervisorPayload::NodeDelete { id } => {
                self.delete_node(&id).await;
                Ok(Value::Null)
            }
            SupervisorPayload::NodePause { id } => {
                let node = self.require_node(&id).await?;
                node.update_status(NodeStatus::Paused).await?;
                Ok(Value::Null)
            }
            SupervisorPayload::NodeDelay { id, delay } => {
                let node = self.require_node(&id).await?;
                node.set_delay(delay).await;
                Ok(Value::Null)
            }
            SupervisorPayload::NodeRun { id, data } => self.run_node(&id, data).await,
            SupervisorPayload::NodeSendData { id } => {
                let node = self.require_node(&id).await?;
                node.send_data(&*self.callbacks.delivery).await?;
                Ok(Value::Null)
            }
        }
    }

    /// Creates and registers a fresh node. Ids embed this supervisor's uid
    /// plus a monotone counter and are never reused.
    pub async fn create_node(
        &self,
        dependencies: Vec<String>,
        chain_id: Option<String>,
    ) -> Arc<Node> {
        let seq = self.next_node_seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-n{}", self.uid, seq);
        let node = Arc::new(Node::new(
            id.clone(),
            dependencies,
            chain_id.clone(),
            Some(self.monitoring.clone() as Arc<dyn crate::node::StatusObserver>),
        ));
        self.monitoring.add_node(&id, chain_id);
        self.nodes.write().await.insert(id.clone(), node.clone());
        debug!(node = %id, "node created");
        node
    }

    /// Removes a node. Unknown ids are a warn-only no-op; an in-flight
    /// execution keeps running against the detached node and its results
    /// become unreachable.
    pub async fn delete_node(&self, id: &str) {
        let removed = self.nodes.write().await.remove(id);
        match removed {
            Some(_) => {
                self.monitoring.remove_node(id);
                self.placements
                    .write()
                    .await
                    .retain(|_, node_id| node_id.as_str() != id);
                debug!(node = %id, "node deleted");
            }
            None => warn!(node = %id, "delete for unknown node ignored"),
        }
    }

    async fn require_node(&self, id: &str) -> Result<Arc<Node>> {
        self.node(id)
            .await
            .ok_or_else(|| FilamentError::NodeNotFound(id.to_string()))
    }

    /// Executes a node after enforcing its dependencies: every dependency
    /// must be `COMPLETED`, otherwise the node is failed and the offending
    /// ids are surfaced.
    pub async fn run_node(&self, id: &str, data: Value) -> Result<Value> {
        let node = self.require_node(id).await?;

        let mut unmet = Vec::new();
        for dep in node.dependencies().await {
            let completed = match self.node(&dep).await {
                Some(dep_node) => dep_node.status().await == NodeStatus::Completed,
                None => false,
            };
            if !completed {
                unmet.push(dep);
            }
        }
        if !unmet.is_empty() {
            if let Err(error) = node.fail().await {
                debug!(node = %id, %error, "could not mark node failed");
            }
            return Err(FilamentError::DependenciesNotMet(unmet));
        }

        node.execute(data).await
    }

    /// Starts a chain from its declarative config.
    ///
    /// Allocates the chain id, creates one local node per `local` stage in
    /// declared order, then emits a single setup broadcast covering the
    /// `remote` stages. A failed broadcast is logged and surfaced as
    /// `BroadcastFailed` but never rolls back the local nodes.
    pub async fn start_chain(&self, config: Vec<StageConfig>) -> Result<String> {
        let chain_id = allocate_chain_id(&self.uid);
        info!(chain = %chain_id, stages = config.len(), "starting chain");

        if let Some(url) = &self.public_url {
            // Reports from every participant route back to the initiator.
            self.agent.register(&chain_id, url);
        }

        let mut stage_nodes = HashMap::new();
        let mut remote_stages = Vec::new();
        for (stage_index, stage) in config.iter().enumerate() {
            if stage.services.is_empty() {
                warn!(chain = %chain_id, stage = stage_index, "skipping stage with no services");
                continue;
            }
            match stage.location {
                Location::Local => {
                    if stage.services.len() > 1 {
                        warn!(
                            chain = %chain_id,
                            stage = stage_index,
                            extra = stage.services.len() - 1,
                            "service fan-out is not supported; addressing the first entry only"
                        );
                    }
                    let node = self.create_node(Vec::new(), Some(chain_id.clone())).await;
                    if let Some(target) = stage.first_target() {
                        self.placements.write().await.insert(
                            (chain_id.clone(), target.target_id),
                            node.id().to_string(),
                        );
                    }
                    stage_nodes.insert(stage_index, node.id().to_string());
                }
                Location::Remote => remote_stages.push(stage.stripped()),
            }
        }

        *self.chain.write().await = Some(ActiveChain {
            chain_id: chain_id.clone(),
            stage_nodes,
        });

        if !remote_stages.is_empty() {
            let message = BroadcastSetupMessage {
                signal: SETUP_SIGNAL.into(),
                chain: ChainDescriptor {
                    id: chain_id.clone(),
                    config: remote_stages,
                },
                monitoring_host: self.public_url.clone(),
            };
            if let Err(error) = self.callbacks.setup.broadcast(&message).await {
                warn!(chain = %chain_id, %error, "setup broadcast failed");
                return Err(FilamentError::BroadcastFailed(error.to_string()));
            }
        }

        Ok(chain_id)
    }

    /// Installs processors on the node created for a local stage, keyed by
    /// stage position in the active chain.
    pub async fn add_processors(
        &self,
        stage_index: usize,
        processors: Vec<BoxedProcessor>,
    ) -> Result<()> {
        let node = self.stage_node(stage_index).await?;
        node.append_pipeline(processors).await
    }

    /// Designates where a local stage's output is forwarded.
    pub async fn set_next_target(&self, stage_index: usize, target: ServiceTarget) -> Result<()> {
        let node = self.stage_node(stage_index).await?;
        node.set_next_target(target).await;
        Ok(())
    }

    async fn stage_node(&self, stage_index: usize) -> Result<Arc<Node>> {
        let chain = self.chain.read().await;
        let node_id = chain
            .as_ref()
            .and_then(|chain| chain.stage_nodes.get(&stage_index))
            .ok_or(FilamentError::StageNotFound(stage_index))?
            .clone();
        drop(chain);
        self.require_node(&node_id).await
    }

    /// The id of the chain this supervisor initiated, if any.
    pub async fn active_chain_id(&self) -> Option<String> {
        self.chain.read().await.as_ref().map(|c| c.chain_id.clone())
    }

    /// Ingests a setup broadcast received from another initiator: registers
    /// the chain's monitoring host and creates a node for the stage's first
    /// service. Returns the placed node's id, or `None` when the stage
    /// carries no services.
    pub async fn apply_setup(&self, message: SetupMessage) -> Result<Option<String>> {
        if let Some(host) = &message.monitoring_host {
            self.agent.register(&message.chain_id, host);
        }

        let Some(target) = message.remote_configs.first_target() else {
            warn!(chain = %message.chain_id, "setup with no services ignored");
            return Ok(None);
        };
        if message.remote_configs.services.len() > 1 {
            warn!(
                chain = %message.chain_id,
                extra = message.remote_configs.services.len() - 1,
                "service fan-out is not supported; placing the first entry only"
            );
        }

        let node = self
            .create_node(Vec::new(), Some(message.chain_id.clone()))
            .await;
        self.placements.write().await.insert(
            (message.chain_id.clone(), target.target_id.clone()),
            node.id().to_string(),
        );
        info!(
            chain = %message.chain_id,
            target = %target.target_id,
            node = %node.id(),
            "placed stage from setup broadcast"
        );
        Ok(Some(node.id().to_string()))
    }

    /// Drives an inbound run request: finds the node placed for the target,
    /// executes it, then forwards output downstream when a next target is
    /// installed.
    pub async fn run_service(
        &self,
        chain_id: &str,
        target_id: &str,
        data: Value,
    ) -> Result<RunOutcome> {
        let node_id = self
            .placements
            .read()
            .await
            .get(&(chain_id.to_string(), target_id.to_string()))
            .cloned()
            .ok_or_else(|| FilamentError::NoNextConnector(target_id.to_string()))?;

        self.run_node(&node_id, data).await?;

        let node = self.require_node(&node_id).await?;
        let forwarded = if node.next_target().await.is_some() {
            node.send_data(&*self.callbacks.delivery).await?;
            true
        } else {
            false
        };

        Ok(RunOutcome {
            node_id,
            status: node.status().await,
            forwarded,
        })
    }

    /// Handles a run message straight off the wire.
    pub async fn run_message(&self, message: RunMessage) -> Result<RunOutcome> {
        let chain_id = message.chain_id.ok_or(FilamentError::MissingChainId)?;
        self.run_service(&chain_id, &message.target_id, message.data)
            .await
    }
}
