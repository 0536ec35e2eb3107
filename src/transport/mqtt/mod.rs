//! MQTT implementation of the pub/sub client
//!
//! Split the same way the rest of the transport layer is: pure pieces
//! (settings, state, event routing) separate from the I/O client.
//!
//! - [`connection`] - broker settings, connection state, client-id scheme
//! - [`events`] - pure routing of rumqttc events
//! - [`client`] - the [`MqttPubSub`] client and its event pump

pub mod client;
pub mod connection;
pub mod events;

pub use client::MqttPubSub;
pub use connection::{client_id, BrokerSettings, ConnectionState};
