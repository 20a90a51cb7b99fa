//! Filament Connector
//!
//! The HTTP surface of a filament peer. A connector binds a
//! [`filament_supervisor::Supervisor`] to the wire protocol: it ingests
//! setup broadcasts, dispatches inbound run requests to placed nodes, and
//! accepts status reports when this peer is a chain's monitoring host.
//!
//! Routes (paths configurable):
//! - `POST /chain/setup` - place a stage from a setup broadcast
//! - `POST /chain/run` - execute a placed service and forward its output
//! - `POST /chain/notify` - ingest a per-node status report
//! - `GET /__health` - liveness probe

pub mod http_router;
pub mod http_server;

pub use http_router::ConnectorRouter;
pub use http_server::ConnectorServer;
