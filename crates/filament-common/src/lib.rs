//! Filament Common Types and Transport
//!
//! This crate provides the wire protocol definitions, the error taxonomy and
//! the HTTP transport primitive shared by every component of the filament
//! fabric.
//!
//! # Overview
//!
//! Filament is a federated pipeline supervisor: every peer (a "connector")
//! runs the same software, a chain initiator declares a multi-stage pipeline
//! once, and the fabric instantiates nodes on each peer, wires data hand-off
//! between them and routes progress reports back to the chain's monitoring
//! peer. This crate contains the pieces all of them agree on:
//!
//! - **Protocol Layer**: chain configs, supervisor signals, wire messages and
//!   the shared error type
//! - **Transport Layer**: the single `post(url, body)` primitive every
//!   cross-peer interaction is built from
//!
//! # Wire format
//!
//! All cross-peer messages are JSON bodies carried over HTTP POST with
//! camelCase field names:
//!
//! - setup: `{"chainId": ..., "remoteConfigs": {"services": [...]}}`
//! - run: `{"chainId": ..., "targetId": ..., "meta"?: ..., "data": ...}`
//! - notify: `{"chainId": ..., "nodeId": ..., "status": ..., "timestamp": ...}`

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use transport::{HttpPoster, PostResponse, Transport, MAX_PAYLOAD_SIZE};
