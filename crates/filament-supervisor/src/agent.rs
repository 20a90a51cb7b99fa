//! The per-process monitoring agent.
//!
//! For each chain this peer participates in, the agent remembers the base
//! URL of the chain's monitoring peer so status reports can be routed back.
//! Entries are registered when a setup broadcast arrives (or by the
//! initiator itself at chain start) and removed explicitly.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

#[derive(Default)]
pub struct MonitoringAgent {
    hosts: RwLock<HashMap<String, String>>,
}

impl MonitoringAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, chain_id: &str, host: &str) {
        let mut hosts = self.hosts.write().expect("agent lock poisoned");
        debug!(chain = %chain_id, host = %host, "registered monitoring host");
        hosts.insert(chain_id.to_string(), host.to_string());
    }

    pub fn remote_monitoring_host(&self, chain_id: &str) -> Option<String> {
        let hosts = self.hosts.read().expect("agent lock poisoned");
        hosts.get(chain_id).cloned()
    }

    pub fn forget(&self, chain_id: &str) {
        let mut hosts = self.hosts.write().expect("agent lock poisoned");
        hosts.remove(chain_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let agent = MonitoringAgent::new();
        agent.register("c-1", "http://peer1:7411");
        assert_eq!(
            agent.remote_monitoring_host("c-1").as_deref(),
            Some("http://peer1:7411")
        );
    }

    #[test]
    fn test_lookup_miss() {
        let agent = MonitoringAgent::new();
        assert!(agent.remote_monitoring_host("c-1").is_none());
    }

    #[test]
    fn test_re_registration_overwrites() {
        let agent = MonitoringAgent::new();
        agent.register("c-1", "http://peer1:7411");
        agent.register("c-1", "http://peer2:7411");
        assert_eq!(
            agent.remote_monitoring_host("c-1").as_deref(),
            Some("http://peer2:7411")
        );
    }

    #[test]
    fn test_forget() {
        let agent = MonitoringAgent::new();
        agent.register("c-1", "http://peer1:7411");
        agent.forget("c-1");
        assert!(agent.remote_monitoring_host("c-1").is_none());
    }
}
