//! Protocol types shared across the fabric.
//!
//! - [`error`] - the error taxonomy and the crate-wide `Result` alias
//! - [`messages`] - chain configuration and wire message types
//! - [`signal`] - the supervisor control-signal payloads

pub mod error;
pub mod messages;
pub mod signal;

pub use error::{FilamentError, Result};
pub use messages::*;
pub use signal::SupervisorPayload;
