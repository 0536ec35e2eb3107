//! Mock implementations for testing
//!
//! Recording stubs for the three collaborator traits. All state lives in
//! shared handles, so cloning a mock before moving it into the SDK keeps a
//! probe the test can assert against afterwards.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::ApiClient;
use crate::error::{SdkError, SdkResult};
use crate::protocol::{DataEnvelope, RegistrationRequest};
use crate::transport::{InboundMessage, NetworkLink, PubSubClient};

/// Mock network link that comes up after a scripted number of status polls
#[derive(Debug, Clone)]
pub struct MockLink {
    /// Status polls observed so far
    pub polls: Arc<AtomicU32>,
    /// Polls required before the link reports connected (u32::MAX = never)
    pub connect_after: Arc<AtomicU32>,
    /// Credentials passed to the last connect call
    pub credentials: Arc<Mutex<Option<(String, String)>>>,
    down: Arc<AtomicBool>,
}

impl MockLink {
    /// Link that is up from the first poll
    pub fn connected() -> Self {
        Self::after_polls(0)
    }

    /// Link that comes up once `n` status polls have been observed
    pub fn after_polls(n: u32) -> Self {
        Self {
            polls: Arc::new(AtomicU32::new(0)),
            connect_after: Arc::new(AtomicU32::new(n)),
            credentials: Arc::new(Mutex::new(None)),
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Link that never comes up
    pub fn never() -> Self {
        Self::after_polls(u32::MAX)
    }

    pub async fn get_credentials(&self) -> Option<(String, String)> {
        self.credentials.lock().await.clone()
    }
}

#[async_trait]
impl NetworkLink for MockLink {
    async fn connect(&mut self, ssid: &str, password: &str) -> SdkResult<()> {
        *self.credentials.lock().await = Some((ssid.to_string(), password.to_string()));
        self.down.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if self.down.load(Ordering::SeqCst) {
            return false;
        }
        let seen = self.polls.fetch_add(1, Ordering::SeqCst);
        seen >= self.connect_after.load(Ordering::SeqCst)
    }

    async fn disconnect(&mut self) -> SdkResult<()> {
        self.down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock pub/sub client with recorded publishes and a scriptable inbound queue
#[derive(Debug, Clone, Default)]
pub struct MockPubSub {
    pub published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub subscriptions: Arc<Mutex<Vec<String>>>,
    pub connect_client_ids: Arc<Mutex<Vec<String>>>,
    pub connect_calls: Arc<AtomicU32>,
    pub disconnect_calls: Arc<AtomicU32>,
    /// Simulated broker-side connection status
    pub connected: Arc<AtomicBool>,
    /// When set, connect attempts fail with a broker rejection
    pub fail_connect: Arc<AtomicBool>,
    /// When set, publish attempts fail
    pub fail_publish: Arc<AtomicBool>,
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
}

impl MockPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the broker dropping (or restoring) the connection
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue a message for the next `service` drain
    pub async fn push_inbound(&self, topic: &str, payload: &[u8]) {
        self.inbound.lock().await.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: bytes::Bytes::copy_from_slice(payload),
        });
    }

    pub async fn get_published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().await.clone()
    }

    pub async fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.published.lock().await.clear();
        self.subscriptions.lock().await.clear();
        self.connect_client_ids.lock().await.clear();
    }
}

#[async_trait]
impl PubSubClient for MockPubSub {
    async fn connect(&mut self, client_id: &str) -> SdkResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connect_client_ids
            .lock()
            .await
            .push(client_id.to_string());

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(SdkError::broker_connect("mock broker refused"));
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> SdkResult<()> {
        self.subscriptions.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> SdkResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(SdkError::publish(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock publish failure",
            )));
        }

        self.published
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn service(&mut self) -> Vec<InboundMessage> {
        self.inbound.lock().await.drain(..).collect()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&mut self) -> SdkResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock API client with a scriptable registration status
#[derive(Debug, Clone)]
pub struct MockApiClient {
    /// HTTP status the registration endpoint "returns" (default 200)
    pub register_status: Arc<AtomicU16>,
    pub registrations: Arc<Mutex<Vec<RegistrationRequest>>>,
    pub ingested: Arc<Mutex<Vec<DataEnvelope>>>,
    pub config_doc: Arc<Mutex<Value>>,
}

impl MockApiClient {
    pub fn new() -> Self {
        Self {
            register_status: Arc::new(AtomicU16::new(200)),
            registrations: Arc::new(Mutex::new(Vec::new())),
            ingested: Arc::new(Mutex::new(Vec::new())),
            config_doc: Arc::new(Mutex::new(Value::Null)),
        }
    }

    pub fn with_register_status(status: u16) -> Self {
        let client = Self::new();
        client.register_status.store(status, Ordering::SeqCst);
        client
    }

    pub async fn get_registrations(&self) -> Vec<RegistrationRequest> {
        self.registrations.lock().await.clone()
    }

    pub async fn get_ingested(&self) -> Vec<DataEnvelope> {
        self.ingested.lock().await.clone()
    }
}

impl Default for MockApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    async fn register_sensor(&self, request: &RegistrationRequest) -> SdkResult<Value> {
        self.registrations.lock().await.push(request.clone());

        let status = self.register_status.load(Ordering::SeqCst);
        if status != 200 {
            return Err(SdkError::registration(status));
        }
        Ok(json!({"status": "registered"}))
    }

    async fn ingest_reading(&self, envelope: &DataEnvelope) -> SdkResult<()> {
        self.ingested.lock().await.push(envelope.clone());
        Ok(())
    }

    async fn fetch_sensor_config(&self, _sensor_id: &str) -> SdkResult<Value> {
        Ok(self.config_doc.lock().await.clone())
    }
}
