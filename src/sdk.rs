//! SDK core: connection lifecycle and message dispatch
//!
//! [`TwinSdk`] orchestrates the three collaborators (network link, pub/sub
//! client, API client) into a connect -> register -> publish/maintain ->
//! disconnect lifecycle. It is tick-driven: the host application must call
//! [`maintain`] on every iteration of its own control loop, because
//! reconnect attempts, inbound command dispatch, and heartbeats only happen
//! there. Starving the tick delays reconnection and command delivery
//! indefinitely.
//!
//! All state lives on this struct and is touched only from the caller's
//! task; inbound messages cross from the pub/sub client's internals through
//! a channel and are dispatched synchronously inside [`maintain`].
//!
//! [`maintain`]: TwinSdk::maintain

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, HttpApiClient};
use crate::config::SdkConfig;
use crate::error::{Link, SdkError, SdkResult};
use crate::protocol::{
    heartbeat, DataEnvelope, Reading, RegistrationRequest, SensorMetadata, TopicBuilder,
};
use crate::transport::mqtt::{client_id, MqttPubSub};
use crate::transport::{AlwaysOnLink, InboundMessage, NetworkLink, PubSubClient};

/// Single-slot callback for inbound command/config text.
pub type MessageHandler = Box<dyn FnMut(&str) + Send>;

/// Single-slot callback for failures surfaced by the maintain tick.
pub type ErrorHandler = Box<dyn FnMut(&SdkError) + Send>;

/// Device-side SDK core.
///
/// Generic over the three collaborator traits so tests can inject recording
/// stubs; [`TwinSdk::with_defaults`] wires the production implementations.
pub struct TwinSdk<L, P, A> {
    config: SdkConfig,
    link: L,
    pubsub: P,
    api: A,
    /// Cached broker status. Reconciled with the pub/sub client's real
    /// status on every maintain tick.
    broker_connected: bool,
    started_at: Instant,
    last_heartbeat: Option<Instant>,
    command_handler: Option<MessageHandler>,
    config_handler: Option<MessageHandler>,
    error_handler: Option<ErrorHandler>,
}

impl TwinSdk<AlwaysOnLink, MqttPubSub, HttpApiClient> {
    /// Build an SDK wired to the production collaborators: an OS-managed
    /// network link, the rumqttc pub/sub client, and the reqwest API client.
    pub fn with_defaults(config: SdkConfig) -> SdkResult<Self> {
        let pubsub = MqttPubSub::from_config(&config)?;
        let api = HttpApiClient::from_config(&config);
        Ok(Self::new(config, AlwaysOnLink, pubsub, api))
    }
}

impl<L, P, A> TwinSdk<L, P, A>
where
    L: NetworkLink,
    P: PubSubClient,
    A: ApiClient,
{
    pub fn new(config: SdkConfig, link: L, pubsub: P, api: A) -> Self {
        Self {
            config,
            link,
            pubsub,
            api,
            broker_connected: false,
            started_at: Instant::now(),
            last_heartbeat: None,
            command_handler: None,
            config_handler: None,
            error_handler: None,
        }
    }

    /// Bring up the network link and connect to the broker.
    ///
    /// The link is polled with a bounded budget (default 20 polls, 500ms
    /// apart); this blocks the calling task for up to the full budget before
    /// failing with [`SdkError::Connectivity`]. No broker connect is
    /// attempted unless the link comes up. On success the command and config
    /// topics are subscribed and the SDK is ready to publish.
    pub async fn initialize(&mut self, ssid: &str, password: &str) -> SdkResult<()> {
        info!(ssid, "bringing up network link");
        self.link.connect(ssid, password).await?;

        let mut attempts = 0;
        while !self.link.is_connected() && attempts < self.config.link.max_poll_attempts {
            tokio::time::sleep(self.config.poll_interval()).await;
            attempts += 1;
        }

        if !self.link.is_connected() {
            return Err(SdkError::connectivity(attempts));
        }
        info!("network link up");

        self.connect_broker().await?;
        info!("SDK initialized");
        Ok(())
    }

    /// Register this sensor with the platform.
    ///
    /// Requires the network link (a live query, not the cached broker flag).
    /// Caller-set metadata fields override the defaults; an empty name is
    /// filled with the sensor id. Success is exactly HTTP 200 and returns
    /// the platform's response body.
    pub async fn register_sensor(
        &self,
        sensor_type: &str,
        metadata: SensorMetadata,
    ) -> SdkResult<Value> {
        if !self.link.is_connected() {
            return Err(SdkError::not_connected(Link::Network));
        }

        let request = RegistrationRequest {
            sensor_type: sensor_type.to_string(),
            sensor_id: self.config.identity.sensor_id.clone(),
            metadata: metadata.resolved_for(&self.config.identity.sensor_id),
        };

        self.api.register_sensor(&request).await
    }

    /// Publish a caller-supplied JSON reading to the data topic.
    ///
    /// The text is parsed before anything is built; malformed input fails
    /// with [`SdkError::InvalidPayload`] and nothing is published. The
    /// parsed fragment is wrapped as the `reading` field of the envelope.
    pub async fn send_data(&self, json_payload: &str) -> SdkResult<()> {
        let reading: Value =
            serde_json::from_str(json_payload).map_err(SdkError::InvalidPayload)?;
        self.publish_reading(reading).await
    }

    /// Publish a `{value, unit?}` reading through the envelope path.
    pub async fn send_reading(&self, value: f64, unit: Option<&str>) -> SdkResult<()> {
        let reading =
            serde_json::to_value(Reading::new(value, unit)).map_err(SdkError::Serialization)?;
        self.publish_reading(reading).await
    }

    /// Publish a bare value with no unit.
    pub async fn send_value(&self, value: f64) -> SdkResult<()> {
        self.send_reading(value, None).await
    }

    /// Publish several reading fragments, stopping at the first failure.
    pub async fn send_batch(&self, readings: &[Value]) -> SdkResult<()> {
        for reading in readings {
            self.publish_reading(reading.clone()).await?;
        }
        Ok(())
    }

    /// Push one reading over HTTP instead of MQTT.
    ///
    /// Explicit fallback for hosts whose broker link is down but whose
    /// network still reaches the API; `send_data` itself never falls back.
    pub async fn send_data_via_api(&self, json_payload: &str) -> SdkResult<()> {
        let reading: Value =
            serde_json::from_str(json_payload).map_err(SdkError::InvalidPayload)?;

        if !self.link.is_connected() {
            return Err(SdkError::not_connected(Link::Network));
        }

        let envelope = self.envelope(reading);
        self.api.ingest_reading(&envelope).await
    }

    /// Fetch this sensor's server-side configuration document.
    pub async fn fetch_sensor_config(&self) -> SdkResult<Value> {
        if !self.link.is_connected() {
            return Err(SdkError::not_connected(Link::Network));
        }
        self.api
            .fetch_sensor_config(&self.config.identity.sensor_id)
            .await
    }

    /// Periodic tick. Call on every iteration of the host's control loop.
    ///
    /// Reconnects the broker (one attempt per tick, no backoff), drains and
    /// dispatches inbound messages, and publishes the heartbeat when due.
    /// Tick failures go to the registered error handler rather than the
    /// return path; they resurface on the next tick.
    pub async fn maintain(&mut self) {
        if !self.pubsub.is_connected() {
            self.broker_connected = false;
            match self.connect_broker().await {
                Ok(()) => info!("broker reconnected"),
                Err(e) => self.report_error(&e),
            }
        }

        // Reconcile the cached flag with the client's real status.
        self.broker_connected = self.pubsub.is_connected();

        let messages = self.pubsub.service().await;
        for message in messages {
            self.dispatch(message);
        }

        if self.heartbeat_due() {
            if let Err(e) = self.publish_reading(heartbeat()).await {
                self.report_error(&e);
            }
            // Timer resets whether or not the publish went out; a failed
            // heartbeat is not retried before the next interval.
            self.last_heartbeat = Some(Instant::now());
        }
    }

    /// Tear down the broker connection and the network link.
    ///
    /// Idempotent: calling when already disconnected is a no-op. Teardown
    /// failures are reported through the error handler, not returned.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.pubsub.disconnect().await {
            self.report_error(&e);
        }
        if let Err(e) = self.link.disconnect().await {
            self.report_error(&e);
        }
        self.broker_connected = false;
    }

    /// Register the command handler. Replaces any previous handler.
    pub fn set_command_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.command_handler = Some(Box::new(handler));
    }

    /// Register the handler for server-pushed config documents.
    pub fn set_config_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.config_handler = Some(Box::new(handler));
    }

    /// Register the error handler invoked for maintain-tick failures.
    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&SdkError) + Send + 'static,
    {
        self.error_handler = Some(Box::new(handler));
    }

    /// Cached broker connection status.
    pub fn broker_connected(&self) -> bool {
        self.broker_connected
    }

    /// Live network link status.
    pub fn network_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Milliseconds since this SDK instance was constructed.
    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    async fn connect_broker(&mut self) -> SdkResult<()> {
        let identity = &self.config.identity;
        let id = client_id(&identity.sensor_id);
        self.pubsub.connect(&id).await?;
        self.broker_connected = true;

        let command_topic = TopicBuilder::command_topic(&identity.project_id, &identity.sensor_id);
        let config_topic = TopicBuilder::config_topic(&identity.project_id, &identity.sensor_id);
        self.pubsub.subscribe(&command_topic).await?;
        self.pubsub.subscribe(&config_topic).await?;
        Ok(())
    }

    fn envelope(&self, reading: Value) -> DataEnvelope {
        DataEnvelope {
            sensor_id: self.config.identity.sensor_id.clone(),
            timestamp: self.uptime_ms(),
            reading,
        }
    }

    async fn publish_reading(&self, reading: Value) -> SdkResult<()> {
        if !self.broker_connected {
            return Err(SdkError::not_connected(Link::Broker));
        }

        let envelope = self.envelope(reading);
        let payload = serde_json::to_vec(&envelope).map_err(SdkError::Serialization)?;

        let identity = &self.config.identity;
        let topic = TopicBuilder::data_topic(&identity.project_id, &identity.sensor_id);
        self.pubsub.publish(&topic, payload).await
    }

    fn dispatch(&mut self, message: InboundMessage) {
        let text = String::from_utf8_lossy(&message.payload);

        if message.topic.ends_with("/commands") {
            if let Some(handler) = self.command_handler.as_mut() {
                handler(&text);
            } else {
                debug!(topic = %message.topic, "command received but no handler registered");
            }
        } else if message.topic.ends_with("/config") {
            if let Some(handler) = self.config_handler.as_mut() {
                handler(&text);
            }
        } else {
            debug!(topic = %message.topic, "ignoring message on unexpected topic");
        }
    }

    fn heartbeat_due(&self) -> bool {
        match self.last_heartbeat {
            None => true,
            Some(at) => at.elapsed() >= self.config.heartbeat_interval(),
        }
    }

    fn report_error(&mut self, error: &SdkError) {
        warn!(%error, "maintain tick failure");
        if let Some(handler) = self.error_handler.as_mut() {
            handler(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{MockApiClient, MockLink, MockPubSub};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_config() -> SdkConfig {
        toml::from_str(
            r#"
            [identity]
            project_token = "dt_abc123xyz"
            sensor_id = "esp32-sensor-01"
            project_id = "project-123"

            [api]
            base_url = "http://localhost:3001/api"

            [broker]
            url = "mqtt://localhost:1883"
        "#,
        )
        .unwrap()
    }

    fn test_sdk() -> TwinSdk<MockLink, MockPubSub, MockApiClient> {
        TwinSdk::new(
            test_config(),
            MockLink::connected(),
            MockPubSub::new(),
            MockApiClient::new(),
        )
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_topic_suffix() {
        let mut sdk = test_sdk();

        let commands = Arc::new(AtomicU32::new(0));
        let configs = Arc::new(AtomicU32::new(0));
        let commands_seen = commands.clone();
        let configs_seen = configs.clone();
        sdk.set_command_handler(move |_| {
            commands_seen.fetch_add(1, Ordering::SeqCst);
        });
        sdk.set_config_handler(move |_| {
            configs_seen.fetch_add(1, Ordering::SeqCst);
        });

        sdk.dispatch(InboundMessage {
            topic: "sensors/project-123/esp32-sensor-01/commands".to_string(),
            payload: Bytes::from_static(b"{\"operation\":\"led_on\"}"),
        });
        sdk.dispatch(InboundMessage {
            topic: "sensors/project-123/esp32-sensor-01/config".to_string(),
            payload: Bytes::from_static(b"{}"),
        });
        sdk.dispatch(InboundMessage {
            topic: "sensors/project-123/esp32-sensor-01/data".to_string(),
            payload: Bytes::from_static(b"{}"),
        });

        assert_eq!(commands.load(Ordering::SeqCst), 1);
        assert_eq!(configs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_without_handler_is_noop() {
        let mut sdk = test_sdk();
        sdk.dispatch(InboundMessage {
            topic: "sensors/project-123/esp32-sensor-01/commands".to_string(),
            payload: Bytes::from_static(b"{\"operation\":\"led_on\"}"),
        });
    }

    #[tokio::test]
    async fn test_registering_handler_replaces_previous() {
        let mut sdk = test_sdk();

        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let first_seen = first.clone();
        let second_seen = second.clone();
        sdk.set_command_handler(move |_| {
            first_seen.fetch_add(1, Ordering::SeqCst);
        });
        sdk.set_command_handler(move |_| {
            second_seen.fetch_add(1, Ordering::SeqCst);
        });

        sdk.dispatch(InboundMessage {
            topic: "sensors/project-123/esp32-sensor-01/commands".to_string(),
            payload: Bytes::from_static(b"{}"),
        });

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
