//! Transport layer.
//!
//! The fabric is built on a single primitive: `post(url, body)`. The
//! [`Transport`] trait is the injection seam; [`HttpPoster`] is the
//! production implementation over a shared reqwest client.

pub mod http;

pub use http::{HttpPoster, PostResponse, Transport, MAX_PAYLOAD_SIZE};
