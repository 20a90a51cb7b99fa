//! Wire-to-supervisor dispatch.
//!
//! The router parses the three inbound body shapes and hands them to the
//! supervisor. Transport concerns (status codes, body size limits, CORS)
//! stay in [`crate::http_server`].

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use filament_common::{ReportingMessage, Result, RunMessage, SetupMessage};
use filament_supervisor::Supervisor;

pub struct ConnectorRouter {
    supervisor: Arc<Supervisor>,
}

impl ConnectorRouter {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Ingests a setup broadcast: registers the chain's monitoring host and
    /// places a node for the stage's first service.
    pub async fn handle_setup(&self, body: &[u8]) -> Result<Value> {
        let message: SetupMessage = serde_json::from_slice(body)?;
        let chain_id = message.chain_id.clone();
        debug!(chain = %chain_id, "setup received");
        let node_id = self.supervisor.apply_setup(message).await?;
        Ok(json!({ "chainId": chain_id, "nodeId": node_id }))
    }

    /// Executes the node placed for the target service and forwards its
    /// output downstream when a next target is installed.
    pub async fn handle_run(&self, body: &[u8]) -> Result<Value> {
        let message: RunMessage = serde_json::from_slice(body)?;
        debug!(target = %message.target_id, "run received");
        let outcome = self.supervisor.run_message(message).await?;
        Ok(serde_json::to_value(outcome)?)
    }

    /// Accepts a status report for a chain this peer monitors.
    pub async fn handle_notify(&self, body: &[u8]) -> Result<Value> {
        let message: ReportingMessage = serde_json::from_slice(body)?;
        self.supervisor.monitoring().ingest(&message);
        Ok(json!({ "accepted": true }))
    }
}
