//! Resolution seams.
//!
//! The core never knows peer addresses: a [`HostResolver`] maps a target
//! service id (plus optional metadata) to a peer base URL, and a
//! [`MonitoringResolver`] maps a chain id to the base URL of that chain's
//! monitoring peer. Both are injected at startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use filament_common::{FilamentError, Result};

use crate::agent::MonitoringAgent;

/// Synchronous service discovery: target id (+ metadata) -> peer base URL.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, target_id: &str, meta: Option<&Value>) -> Option<String>;
}

/// Map-backed resolver seeded from configuration (`--peer svc=url`).
/// Metadata is accepted and ignored.
#[derive(Default)]
pub struct StaticHostResolver {
    hosts: HashMap<String, String>,
}

impl StaticHostResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            hosts: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, target_id: impl Into<String>, url: impl Into<String>) {
        self.hosts.insert(target_id.into(), url.into());
    }
}

impl HostResolver for StaticHostResolver {
    fn resolve(&self, target_id: &str, _meta: Option<&Value>) -> Option<String> {
        self.hosts.get(target_id).cloned()
    }
}

/// Chain id -> monitoring peer base URL. May consult remote state, hence
/// async.
#[async_trait]
pub trait MonitoringResolver: Send + Sync {
    async fn resolve(&self, chain_id: &str) -> Result<String>;
}

/// Default monitoring resolver: consults the process-local
/// [`MonitoringAgent`]. A miss is `MonitoringNotFound`, which callers treat
/// as a dropped report.
pub struct AgentMonitoringResolver {
    agent: Arc<MonitoringAgent>,
}

impl AgentMonitoringResolver {
    pub fn new(agent: Arc<MonitoringAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl MonitoringResolver for AgentMonitoringResolver {
    async fn resolve(&self, chain_id: &str) -> Result<String> {
        self.agent
            .remote_monitoring_host(chain_id)
            .ok_or_else(|| FilamentError::MonitoringNotFound(chain_id.to_string()))
    }
}
