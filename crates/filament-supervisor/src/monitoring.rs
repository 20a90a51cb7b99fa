//! Aggregate chain state.
//!
//! `NodeMonitoring` tracks every node this peer knows about in three disjoint
//! buckets (completed / pending / failed) and emits a [`ReportingMessage`]
//! through the supervisor's reporting callback on every status change. On the
//! chain's monitoring peer the same structure also ingests reports arriving
//! over the notify endpoint, so one component serves both sides.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tracing::debug;

use filament_common::{ChainState, NodeStatus, ReportingMessage};

use crate::callbacks::ReportSink;
use crate::node::StatusObserver;

pub struct NodeMonitoring {
    inner: Mutex<MonitorState>,
    sink: Arc<dyn ReportSink>,
}

#[derive(Default)]
struct MonitorState {
    /// Membership: node id -> owning chain (if any).
    members: HashMap<String, Option<String>>,
    completed: BTreeSet<String>,
    pending: BTreeSet<String>,
    failed: BTreeSet<String>,
}

impl MonitorState {
    fn clear_buckets(&mut self, node_id: &str) {
        self.completed.remove(node_id);
        self.pending.remove(node_id);
        self.failed.remove(node_id);
    }

    /// Places the node in the bucket matching `status`. `PAUSED` and
    /// `IN_PROGRESS` nodes sit in no bucket.
    fn place(&mut self, node_id: &str, status: NodeStatus) {
        self.clear_buckets(node_id);
        match status {
            NodeStatus::Completed => {
                self.completed.insert(node_id.to_string());
            }
            NodeStatus::Pending => {
                self.pending.insert(node_id.to_string());
            }
            NodeStatus::Failed => {
                self.failed.insert(node_id.to_string());
            }
            NodeStatus::InProgress | NodeStatus::Paused => {}
        }
    }
}

impl NodeMonitoring {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self {
            inner: Mutex::new(MonitorState::default()),
            sink,
        }
    }

    /// Registers a node; new nodes start in the pending bucket.
    pub fn add_node(&self, node_id: &str, chain_id: Option<String>) {
        let mut state = self.inner.lock().expect("monitoring lock poisoned");
        state.members.insert(node_id.to_string(), chain_id);
        state.place(node_id, NodeStatus::Pending);
    }

    /// Drops a node from membership and buckets. Unknown ids are ignored so
    /// deletion stays idempotent.
    pub fn remove_node(&self, node_id: &str) {
        let mut state = self.inner.lock().expect("monitoring lock poisoned");
        state.members.remove(node_id);
        state.clear_buckets(node_id);
    }

    /// Ingests a report that arrived from another peer over the notify
    /// endpoint. Membership is learned on first sight; no report is
    /// re-emitted (the sender already routed it here).
    pub fn ingest(&self, message: &ReportingMessage) {
        let mut state = self.inner.lock().expect("monitoring lock poisoned");
        state
            .members
            .entry(message.node_id.clone())
            .or_insert_with(|| message.chain_id.clone());
        state.place(&message.node_id, message.status);
        debug!(node = %message.node_id, status = %message.status, "ingested remote report");
    }

    /// Atomic read of the three buckets.
    pub fn snapshot(&self) -> ChainState {
        let state = self.inner.lock().expect("monitoring lock poisoned");
        ChainState {
            completed: state.completed.clone(),
            pending: state.pending.clone(),
            failed: state.failed.clone(),
        }
    }

    /// The buckets restricted to one chain's nodes.
    pub fn chain_snapshot(&self, chain_id: &str) -> ChainState {
        let state = self.inner.lock().expect("monitoring lock poisoned");
        let belongs = |node_id: &str| {
            state
                .members
                .get(node_id)
                .map(|chain| chain.as_deref() == Some(chain_id))
                .unwrap_or(false)
        };
        ChainState {
            completed: state
                .completed
                .iter()
                .filter(|n| belongs(n.as_str()))
                .cloned()
                .collect(),
            pending: state
                .pending
                .iter()
                .filter(|n| belongs(n.as_str()))
                .cloned()
                .collect(),
            failed: state
                .failed
                .iter()
                .filter(|n| belongs(n.as_str()))
                .cloned()
                .collect(),
        }
    }
}

impl StatusObserver for NodeMonitoring {
    fn status_changed(&self, node_id: &str, chain_id: Option<&str>, status: NodeStatus) {
        {
            let mut state = self.inner.lock().expect("monitoring lock poisoned");
            if !state.members.contains_key(node_id) {
                // Transitions from a deleted node's in-flight execution.
                debug!(node = %node_id, "discarding status change for unknown node");
                return;
            }
            state.place(node_id, status);
        }
        self.sink.report(ReportingMessage::new(
            chain_id.map(str::to_string),
            node_id,
            status,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<ReportingMessage>>,
    }

    impl ReportSink for RecordingSink {
        fn report(&self, message: ReportingMessage) {
            self.reports.lock().unwrap().push(message);
        }
    }

    fn monitoring() -> (Arc<RecordingSink>, NodeMonitoring) {
        let sink = Arc::new(RecordingSink::default());
        let monitoring = NodeMonitoring::new(sink.clone());
        (sink, monitoring)
    }

    #[test]
    fn test_new_node_lands_in_pending() {
        let (_, monitoring) = monitoring();
        monitoring.add_node("n-1", None);
        let snapshot = monitoring.snapshot();
        assert!(snapshot.pending.contains("n-1"));
        assert!(snapshot.completed.is_empty());
        assert!(snapshot.failed.is_empty());
    }

    #[test]
    fn test_node_occupies_one_bucket_at_a_time() {
        let (_, monitoring) = monitoring();
        monitoring.add_node("n-1", None);
        monitoring.status_changed("n-1", None, NodeStatus::InProgress);
        let snapshot = monitoring.snapshot();
        assert!(!snapshot.pending.contains("n-1"));
        assert!(!snapshot.completed.contains("n-1"));
        assert!(!snapshot.failed.contains("n-1"));

        monitoring.status_changed("n-1", None, NodeStatus::Completed);
        let snapshot = monitoring.snapshot();
        assert!(snapshot.completed.contains("n-1"));
        assert!(!snapshot.pending.contains("n-1"));
    }

    #[test]
    fn test_status_change_emits_report() {
        let (sink, monitoring) = monitoring();
        monitoring.add_node("n-1", Some("c-1".into()));
        monitoring.status_changed("n-1", Some("c-1"), NodeStatus::Failed);

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].node_id, "n-1");
        assert_eq!(reports[0].chain_id.as_deref(), Some("c-1"));
        assert_eq!(reports[0].status, NodeStatus::Failed);
    }

    #[test]
    fn test_unknown_node_changes_are_discarded() {
        let (sink, monitoring) = monitoring();
        monitoring.status_changed("ghost", None, NodeStatus::Completed);
        assert!(sink.reports.lock().unwrap().is_empty());
        assert!(monitoring.snapshot().completed.is_empty());
    }

    #[test]
    fn test_remove_node_is_idempotent() {
        let (_, monitoring) = monitoring();
        monitoring.add_node("n-1", None);
        monitoring.remove_node("n-1");
        monitoring.remove_node("n-1");
        assert!(monitoring.snapshot().pending.is_empty());
    }

    #[test]
    fn test_ingest_learns_membership_without_re_emitting() {
        let (sink, monitoring) = monitoring();
        let report = ReportingMessage::new(Some("c-1".into()), "remote-n", NodeStatus::Completed);
        monitoring.ingest(&report);

        assert!(sink.reports.lock().unwrap().is_empty());
        let snapshot = monitoring.chain_snapshot("c-1");
        assert!(snapshot.completed.contains("remote-n"));
    }

    #[test]
    fn test_chain_snapshot_filters_by_chain() {
        let (_, monitoring) = monitoring();
        monitoring.add_node("a", Some("c-1".into()));
        monitoring.add_node("b", Some("c-2".into()));
        let snapshot = monitoring.chain_snapshot("c-1");
        assert!(snapshot.pending.contains("a"));
        assert!(!snapshot.pending.contains("b"));
    }
}
