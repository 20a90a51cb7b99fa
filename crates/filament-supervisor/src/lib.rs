//! Filament Supervisor
//!
//! The control-plane core of a filament peer. A [`Supervisor`] owns all nodes
//! created on this process, dispatches the six `NODE_*` control signals,
//! turns a declarative chain config into local nodes plus a setup broadcast
//! for remote stages, and routes per-node status reports toward the chain's
//! monitoring peer.
//!
//! # Components
//!
//! - [`processor`] - the pure unit of work applied inside a node
//! - [`node`] - the node state machine (status lattice, pipeline, hand-off)
//! - [`monitoring`] - aggregate chain state and report emission
//! - [`chain`] - chain-id allocation
//! - [`resolver`] - host and monitoring-host resolution seams
//! - [`agent`] - the per-process chain -> monitoring-host registry
//! - [`callbacks`] - the four injectable callback seams and their default
//!   HTTP wiring
//! - [`supervisor`] - the supervisor itself
//!
//! # Singletons
//!
//! The supervisor and the monitoring agent are one-per-process by
//! convention: they are constructed once at startup and passed by `Arc` into
//! everything that needs them. Nothing in this crate reaches for hidden
//! globals.

pub mod agent;
pub mod callbacks;
pub mod chain;
pub mod monitoring;
pub mod node;
pub mod processor;
pub mod resolver;
pub mod supervisor;

pub use agent::MonitoringAgent;
pub use callbacks::{
    default_callbacks, DataDelivery, HttpDataDelivery, HttpReportForwarder, HttpSetupBroadcaster,
    ForwardingReportSink, ReportForwarder, ReportSink, SetupBroadcaster, SupervisorCallbacks,
};
pub use chain::allocate_chain_id;
pub use monitoring::NodeMonitoring;
pub use node::{Node, StatusObserver};
pub use processor::{processor_fn, BoxedProcessor, Processor};
pub use resolver::{AgentMonitoringResolver, HostResolver, MonitoringResolver, StaticHostResolver};
pub use supervisor::{RunOutcome, Supervisor};
