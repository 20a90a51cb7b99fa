//! Callback seams and their default HTTP wiring.
//!
//! The supervisor is parameterized over four callbacks, set once at
//! construction:
//!
//! 1. **setup broadcast** - turns a chain's remote stages into per-peer
//!    setup POSTs
//! 2. **delivery** - hands a completed node's output to the next peer
//! 3. **reporting** - receives every per-node status report
//! 4. **report forwarding** - routes a report to the chain's monitoring peer
//!
//! [`default_callbacks`] installs the HTTP implementations of all four over
//! an injected [`Transport`]. Replacing a callback on a live supervisor is
//! not supported; build a new supervisor instead.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use filament_common::{
    BroadcastSetupMessage, FilamentError, Paths, ReportingMessage, Result, RunMessage,
    SetupMessage, Transport,
};

use crate::resolver::{HostResolver, MonitoringResolver};

/// Emits the node-creation broadcast for a chain's remote stages.
#[async_trait]
pub trait SetupBroadcaster: Send + Sync {
    async fn broadcast(&self, message: &BroadcastSetupMessage) -> Result<()>;
}

/// Downstream data hand-off: delivers a completed node's output to the peer
/// owning the next stage.
#[async_trait]
pub trait DataDelivery: Send + Sync {
    async fn deliver(&self, payload: &RunMessage) -> Result<()>;
}

/// Receives every per-node status report emitted by the monitoring. This is
/// the `reportSignalHandler` seam: embedders may substitute their own sink.
pub trait ReportSink: Send + Sync {
    fn report(&self, message: ReportingMessage);
}

/// Routes one report to the chain's monitoring peer.
#[async_trait]
pub trait ReportForwarder: Send + Sync {
    async fn forward(&self, message: &ReportingMessage) -> Result<()>;
}

/// The callback set a supervisor is built with.
#[derive(Clone)]
pub struct SupervisorCallbacks {
    pub setup: Arc<dyn SetupBroadcaster>,
    pub delivery: Arc<dyn DataDelivery>,
    pub reporting: Arc<dyn ReportSink>,
}

/// Default setup broadcast: one fire-and-forget POST per stage.
///
/// Each stage resolves its first service entry; unresolved targets and empty
/// service lists are logged and skipped, and one stage's failure never
/// aborts the rest. The POST result is awaited on a detached task so errors
/// are still logged without blocking chain start.
pub struct HttpSetupBroadcaster {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn HostResolver>,
    paths: Paths,
}

impl HttpSetupBroadcaster {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn HostResolver>,
        paths: Paths,
    ) -> Self {
        Self {
            transport,
            resolver,
            paths,
        }
    }
}

#[async_trait]
impl SetupBroadcaster for HttpSetupBroadcaster {
    async fn broadcast(&self, message: &BroadcastSetupMessage) -> Result<()> {
        for (stage_index, stage) in message.chain.config.iter().enumerate() {
            let Some(target) = stage.first_target() else {
                warn!(chain = %message.chain.id, stage = stage_index, "skipping stage with no services");
                continue;
            };
            if stage.services.len() > 1 {
                warn!(
                    chain = %message.chain.id,
                    stage = stage_index,
                    extra = stage.services.len() - 1,
                    "service fan-out is not supported; addressing the first entry only"
                );
            }
            let Some(url) = self.resolver.resolve(&target.target_id, target.meta.as_ref()) else {
                warn!(
                    chain = %message.chain.id,
                    target = %target.target_id,
                    "no connector resolves setup target; stage skipped"
                );
                continue;
            };

            let body = serde_json::to_value(SetupMessage {
                chain_id: message.chain.id.clone(),
                remote_configs: stage.clone(),
                monitoring_host: message.monitoring_host.clone(),
            })?;
            let endpoint = format!("{}{}", url, self.paths.setup);
            let transport = self.transport.clone();
            let chain_id = message.chain.id.clone();

            tokio::spawn(async move {
                match transport.post(&endpoint, &body).await {
                    Ok(response) if response.is_success() => {
                        debug!(chain = %chain_id, peer = %endpoint, "setup delivered");
                    }
                    Ok(response) => {
                        let error = FilamentError::SetupPostFailed {
                            peer: endpoint.clone(),
                            cause: format!("status {}", response.status),
                        };
                        warn!(chain = %chain_id, %error, "setup POST rejected");
                    }
                    Err(cause) => {
                        let error = FilamentError::SetupPostFailed {
                            peer: endpoint.clone(),
                            cause: cause.to_string(),
                        };
                        warn!(chain = %chain_id, %error, "setup POST failed");
                    }
                }
            });
        }
        Ok(())
    }
}

/// Default data hand-off: an awaited POST to `<peer><run>`, since the
/// caller's node state depends on the outcome.
pub struct HttpDataDelivery {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn HostResolver>,
    paths: Paths,
}

impl HttpDataDelivery {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn HostResolver>,
        paths: Paths,
    ) -> Self {
        Self {
            transport,
            resolver,
            paths,
        }
    }
}

#[async_trait]
impl DataDelivery for HttpDataDelivery {
    async fn deliver(&self, payload: &RunMessage) -> Result<()> {
        if payload.chain_id.is_none() {
            return Err(FilamentError::MissingChainId);
        }
        let url = self
            .resolver
            .resolve(&payload.target_id, payload.meta.as_ref())
            .ok_or_else(|| FilamentError::NoNextConnector(payload.target_id.clone()))?;

        let endpoint = format!("{}{}", url, self.paths.run);
        let response = self
            .transport
            .post(&endpoint, &serde_json::to_value(payload)?)
            .await?;
        if !response.is_success() {
            return Err(FilamentError::Transport(format!(
                "hand-off to {} rejected with status {}",
                endpoint, response.status
            )));
        }
        debug!(target = %payload.target_id, peer = %endpoint, "data handed off");
        Ok(())
    }
}

/// Default report forwarder: resolves the chain's monitoring host and POSTs
/// the report to `<host><notify>`.
pub struct HttpReportForwarder {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn MonitoringResolver>,
    paths: Paths,
}

impl HttpReportForwarder {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn MonitoringResolver>,
        paths: Paths,
    ) -> Self {
        Self {
            transport,
            resolver,
            paths,
        }
    }
}

#[async_trait]
impl ReportForwarder for HttpReportForwarder {
    async fn forward(&self, message: &ReportingMessage) -> Result<()> {
        let Some(chain_id) = message.chain_id.as_deref() else {
            // Nodes outside any chain have no monitoring peer to report to.
            debug!(node = %message.node_id, "report without chain id dropped");
            return Ok(());
        };
        let host = self.resolver.resolve(chain_id).await?;
        let endpoint = format!("{}{}", host, self.paths.notify);
        let response = self
            .transport
            .post(&endpoint, &serde_json::to_value(message)?)
            .await?;
        if !response.is_success() {
            return Err(FilamentError::Transport(format!(
                "notify to {} rejected with status {}",
                endpoint, response.status
            )));
        }
        Ok(())
    }
}

/// Default reporting callback: forwards each report to the chain's
/// monitoring peer through a single background task, preserving the order in
/// which status changes occurred.
///
/// Must be constructed inside a tokio runtime.
pub struct ForwardingReportSink {
    tx: mpsc::UnboundedSender<ReportingMessage>,
}

impl ForwardingReportSink {
    pub fn new(forwarder: Arc<dyn ReportForwarder>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReportingMessage>();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match forwarder.forward(&message).await {
                    Ok(()) => {}
                    Err(FilamentError::MonitoringNotFound(chain)) => {
                        warn!(chain = %chain, node = %message.node_id, "no monitoring host; report dropped");
                    }
                    Err(error) => {
                        warn!(%error, node = %message.node_id, "failed to forward status report");
                    }
                }
            }
        });
        Self { tx }
    }
}

impl ReportSink for ForwardingReportSink {
    fn report(&self, message: ReportingMessage) {
        // Send only fails once the drain task is gone, i.e. at shutdown.
        let _ = self.tx.send(message);
    }
}

/// Installs the default HTTP wiring for all four callbacks.
pub fn default_callbacks(
    transport: Arc<dyn Transport>,
    host_resolver: Arc<dyn HostResolver>,
    monitoring_resolver: Arc<dyn MonitoringResolver>,
    paths: Paths,
) -> SupervisorCallbacks {
    let forwarder = Arc::new(HttpReportForwarder::new(
        transport.clone(),
        monitoring_resolver,
        paths.clone(),
    ));
    SupervisorCallbacks {
        setup: Arc::new(HttpSetupBroadcaster::new(
            transport.clone(),
            host_resolver.clone(),
            paths.clone(),
        )),
        delivery: Arc::new(HttpDataDelivery::new(transport, host_resolver, paths)),
        reporting: Arc::new(ForwardingReportSink::new(forwarder)),
    }
}
