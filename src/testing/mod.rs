//! Testing utilities and mock implementations
//!
//! This module provides mock implementations of the SDK's collaborator
//! traits so the connection lifecycle can be tested without a broker, an
//! API server, or a radio.

pub mod mocks;

pub use mocks::*;
