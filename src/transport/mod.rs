//! Transport layer: network link and pub/sub abstractions
//!
//! Both collaborators sit behind traits to enable dependency injection and
//! testing. The SDK core drives them from a single control task; adapters
//! must not call back into application code from other tasks.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SdkResult;

pub mod mqtt;

/// Message delivered by the pub/sub client, drained during `maintain`.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// The underlying network connectivity provider (WiFi or equivalent).
///
/// `connect` only kicks off association; callers poll [`is_connected`]
/// until the link reports up. On hosts where the operating system owns
/// connectivity, use [`AlwaysOnLink`].
///
/// [`is_connected`]: NetworkLink::is_connected
#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Begin connecting with the given credentials. Non-blocking.
    async fn connect(&mut self, ssid: &str, password: &str) -> SdkResult<()>;

    /// Live status query against the link.
    fn is_connected(&self) -> bool;

    /// Tear the link down. Must tolerate being called when already down.
    async fn disconnect(&mut self) -> SdkResult<()>;
}

/// Client for the message broker.
///
/// `is_connected` reflects the client's real connection status; the SDK core
/// caches it and reconciles the cache on every `maintain` tick.
#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Connect (or reconnect) to the broker under the given client id.
    async fn connect(&mut self, client_id: &str) -> SdkResult<()>;

    /// Subscribe to a topic. Subscriptions do not survive reconnects; the
    /// caller re-subscribes after each successful `connect`.
    async fn subscribe(&mut self, topic: &str) -> SdkResult<()>;

    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> SdkResult<()>;

    /// Drain messages received since the last call. Never blocks.
    async fn service(&mut self) -> Vec<InboundMessage>;

    /// Real connection status as last observed by the client.
    fn is_connected(&self) -> bool;

    /// Disconnect from the broker. Must tolerate repeated calls.
    async fn disconnect(&mut self) -> SdkResult<()>;
}

/// Network link for hosts whose operating system manages connectivity.
///
/// Reports connected from the first poll and ignores credentials.
#[derive(Debug, Default)]
pub struct AlwaysOnLink;

#[async_trait]
impl NetworkLink for AlwaysOnLink {
    async fn connect(&mut self, _ssid: &str, _password: &str) -> SdkResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn disconnect(&mut self) -> SdkResult<()> {
        Ok(())
    }
}

/// Type alias for the MQTT-backed pub/sub client
pub type MqttTransport = mqtt::MqttPubSub;
