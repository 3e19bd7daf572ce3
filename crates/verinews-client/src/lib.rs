//! Remote verification service: async trait plus an HTTP implementation.

mod service;
pub use service::{IngestResponse, VerificationService};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{ClientConfig, HttpVerificationClient};
