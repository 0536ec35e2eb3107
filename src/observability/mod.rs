//! Observability for the SDK
//!
//! Structured logging only; the SDK itself exposes no metrics or health
//! endpoints.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
