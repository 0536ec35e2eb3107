//! rumqttc-backed pub/sub client
//!
//! Each `connect` call builds a fresh rumqttc client and spawns one event
//! pump task for its lifetime. The pump reports connection state through a
//! watch channel, forwards inbound publishes into a bounded mpsc channel,
//! and exits on any connection error - it never reconnects on its own.
//! Reconnection is driven entirely by the SDK core's `maintain` tick, one
//! attempt per tick.

use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::connection::{mqtt_options, BrokerSettings, ConnectionState};
use super::events::{route_event, EventRoute};
use crate::config::SdkConfig;
use crate::error::{Link, SdkError, SdkResult};
use crate::transport::{InboundMessage, PubSubClient};

/// Capacity of the inbound message channel. Messages beyond this arriving
/// between two `service` calls are dropped with a warning.
const INBOUND_QUEUE_DEPTH: usize = 64;

/// MQTT implementation of [`PubSubClient`]
pub struct MqttPubSub {
    settings: BrokerSettings,
    client: Option<AsyncClient>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    inbound_rx: Option<mpsc::Receiver<InboundMessage>>,
    pump_handle: Option<JoinHandle<()>>,
}

impl MqttPubSub {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            client: None,
            state_tx: None,
            state_rx: None,
            shutdown_tx: None,
            inbound_rx: None,
            pump_handle: None,
        }
    }

    pub fn from_config(config: &SdkConfig) -> SdkResult<Self> {
        let settings = BrokerSettings::from_url(&config.broker.url, config.connect_timeout())?;
        Ok(Self::new(settings))
    }

    /// Wait until the pump reports the result of the connect attempt
    async fn wait_for_connack(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> SdkResult<()> {
        let outcome = tokio::time::timeout(timeout, async {
            loop {
                match state_rx.borrow().clone() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Rejected(reason) => {
                        return Err(SdkError::broker_connect(reason));
                    }
                    ConnectionState::Disconnected(reason) => {
                        return Err(SdkError::broker_connect(reason));
                    }
                    ConnectionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(SdkError::broker_connect("event pump exited"));
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(SdkError::broker_connect(
                "timed out waiting for broker acknowledgement",
            )),
        }
    }

    /// Stop the previous connection's pump, if any
    fn teardown_pump(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.pump_handle.take() {
            handle.abort();
        }
        self.client = None;
        self.state_tx = None;
        self.state_rx = None;
        self.inbound_rx = None;
    }

    /// Guard publish/subscribe against an unusable connection
    fn check_connected(&self) -> SdkResult<()> {
        let connected = self
            .state_rx
            .as_ref()
            .map(|rx| *rx.borrow() == ConnectionState::Connected)
            .unwrap_or(false);

        if connected {
            Ok(())
        } else {
            Err(SdkError::not_connected(Link::Broker))
        }
    }

    async fn run_event_pump(
        mut event_loop: EventLoop,
        state_tx: watch::Sender<ConnectionState>,
        inbound_tx: mpsc::Sender<InboundMessage>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("event pump shutting down");
                        break;
                    }
                }
                event = event_loop.poll() => {
                    match event {
                        Ok(event) => match route_event(&event) {
                            EventRoute::ConnectionAcknowledged => {
                                let _ = state_tx.send(ConnectionState::Connected);
                            }
                            EventRoute::ConnectionRejected(reason) => {
                                let _ = state_tx.send(ConnectionState::Rejected(reason));
                                break;
                            }
                            EventRoute::MessageReceived { topic, payload } => {
                                let message = InboundMessage { topic, payload };
                                if inbound_tx.try_send(message).is_err() {
                                    warn!("inbound queue full, dropping message");
                                }
                            }
                            EventRoute::Disconnected => {
                                let _ = state_tx.send(ConnectionState::Disconnected(
                                    "broker closed the connection".to_string(),
                                ));
                                break;
                            }
                            EventRoute::Ignored => {}
                        },
                        Err(e) => {
                            let _ = state_tx.send(ConnectionState::Disconnected(e.to_string()));
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl PubSubClient for MqttPubSub {
    async fn connect(&mut self, client_id: &str) -> SdkResult<()> {
        self.teardown_pump();

        let options = mqtt_options(client_id, &self.settings);
        let (client, event_loop) = AsyncClient::new(options, 10);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);

        let pump_state_tx = state_tx.clone();
        let handle = tokio::spawn(async move {
            Self::run_event_pump(event_loop, pump_state_tx, inbound_tx, shutdown_rx).await;
        });

        let wait_result =
            Self::wait_for_connack(state_rx.clone(), self.settings.connect_timeout).await;

        if let Err(e) = wait_result {
            let _ = shutdown_tx.send(true);
            handle.abort();
            return Err(e);
        }

        info!(client_id, host = %self.settings.host, "connected to broker");
        self.client = Some(client);
        self.state_tx = Some(state_tx);
        self.state_rx = Some(state_rx);
        self.shutdown_tx = Some(shutdown_tx);
        self.inbound_rx = Some(inbound_rx);
        self.pump_handle = Some(handle);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> SdkResult<()> {
        self.check_connected()?;

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SdkError::not_connected(Link::Broker))?;
        client
            .subscribe(topic.to_string(), QoS::AtLeastOnce)
            .await
            .map_err(SdkError::subscribe)?;

        debug!(topic, "subscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> SdkResult<()> {
        self.check_connected()?;

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SdkError::not_connected(Link::Broker))?;
        client
            .publish(topic.to_string(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(SdkError::publish)?;

        Ok(())
    }

    async fn service(&mut self) -> Vec<InboundMessage> {
        let mut drained = Vec::new();
        if let Some(rx) = self.inbound_rx.as_mut() {
            while let Ok(message) = rx.try_recv() {
                drained.push(message);
            }
        }
        drained
    }

    fn is_connected(&self) -> bool {
        self.state_rx
            .as_ref()
            .map(|rx| *rx.borrow() == ConnectionState::Connected)
            .unwrap_or(false)
    }

    async fn disconnect(&mut self) -> SdkResult<()> {
        if let Some(client) = self.client.as_ref() {
            // Best effort: the pump may already have died with the connection.
            let _ = client.disconnect().await;
        }
        if let Some(state_tx) = self.state_tx.as_ref() {
            let _ = state_tx.send(ConnectionState::Disconnected(
                "client disconnected".to_string(),
            ));
        }
        self.teardown_pump();
        info!("disconnected from broker");
        Ok(())
    }
}

impl Drop for MqttPubSub {
    fn drop(&mut self) {
        // Stop the background pump; a graceful broker disconnect needs async
        // and must go through disconnect() instead.
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.pump_handle.take() {
            handle.abort();
        }
    }
}
