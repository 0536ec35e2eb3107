//! twinlink - device-side SDK for the Twin telemetry platform
//!
//! Connects a sensor host to the platform: brings up the network link,
//! registers the sensor identity over HTTP, publishes readings and
//! heartbeats over MQTT, and dispatches inbound command messages to
//! application callbacks.
//!
//! # Overview
//!
//! This crate provides:
//! - The [`TwinSdk`] core managing the connect -> register -> publish ->
//!   maintain -> disconnect lifecycle
//! - An MQTT pub/sub client built on rumqttc
//! - An HTTP registration/ingest client built on reqwest
//! - Trait seams for all three collaborators, with recording mocks in
//!   [`testing`]
//!
//! The SDK is tick-driven: call [`TwinSdk::maintain`] on every iteration of
//! your control loop. Reconnection, command delivery, and heartbeats all
//! happen inside that call.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use twinlink::{SdkConfig, SensorMetadata, TwinSdk};
//!
//! # async fn run() -> twinlink::SdkResult<()> {
//! let config = SdkConfig::load_from_file("twinlink.toml")?;
//! let mut sdk = TwinSdk::with_defaults(config)?;
//!
//! sdk.set_command_handler(|command| {
//!     println!("received command: {command}");
//! });
//!
//! sdk.initialize("YourWiFiSSID", "YourWiFiPassword").await?;
//! sdk.register_sensor("temperature", SensorMetadata::default())
//!     .await?;
//!
//! loop {
//!     sdk.maintain().await;
//!     sdk.send_reading(25.5, Some("C")).await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! }
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod sdk;
pub mod testing;
pub mod transport;

pub use config::SdkConfig;
pub use error::{Link, SdkError, SdkResult};
pub use protocol::{DataEnvelope, Reading, RegistrationRequest, SensorMetadata, TopicBuilder};
pub use sdk::TwinSdk;
pub use transport::mqtt::MqttPubSub;
