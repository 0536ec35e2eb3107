//! Wire documents and topic naming for the telemetry platform
//!
//! This module defines the JSON structures published to and received from
//! the platform, plus the topic-name conventions scoping them to one sensor
//! identity.

pub mod envelope;
pub mod topics;

pub use envelope::*;
pub use topics::*;
