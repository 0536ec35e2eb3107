//! Integration tests for the SDK connection lifecycle
//!
//! Everything runs against the recording mocks under paused tokio time, so
//! the initialize poll loop and heartbeat intervals are exercised without
//! real delays.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

use twinlink::testing::mocks::{MockApiClient, MockLink, MockPubSub};
use twinlink::transport::PubSubClient;
use twinlink::{Link, SdkConfig, SdkError, SensorMetadata, TopicBuilder, TwinSdk};

const SENSOR_ID: &str = "esp32-sensor-01";
const PROJECT_ID: &str = "project-123";

fn test_config() -> SdkConfig {
    toml::from_str(&format!(
        r#"
        [identity]
        project_token = "dt_abc123xyz"
        sensor_id = "{SENSOR_ID}"
        project_id = "{PROJECT_ID}"

        [api]
        base_url = "http://localhost:3001/api"

        [broker]
        url = "mqtt://localhost:1883"
    "#
    ))
    .unwrap()
}

fn build_sdk(
    link: MockLink,
) -> (
    TwinSdk<MockLink, MockPubSub, MockApiClient>,
    MockPubSub,
    MockApiClient,
) {
    let pubsub = MockPubSub::new();
    let api = MockApiClient::new();
    let sdk = TwinSdk::new(test_config(), link, pubsub.clone(), api.clone());
    (sdk, pubsub, api)
}

fn data_topic() -> String {
    TopicBuilder::data_topic(PROJECT_ID, SENSOR_ID)
}

fn command_topic() -> String {
    TopicBuilder::command_topic(PROJECT_ID, SENSOR_ID)
}

async fn published_envelopes(pubsub: &MockPubSub) -> Vec<(String, Value)> {
    pubsub
        .get_published()
        .await
        .into_iter()
        .map(|(topic, payload)| (topic, serde_json::from_slice(&payload).unwrap()))
        .collect()
}

// ========== initialize ==========

#[tokio::test(start_paused = true)]
async fn test_initialize_succeeds_when_link_comes_up() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::after_polls(3));

    sdk.initialize("YourWiFiSSID", "YourWiFiPassword")
        .await
        .unwrap();

    assert!(sdk.network_connected());
    assert!(sdk.broker_connected());

    let subscriptions = pubsub.get_subscriptions().await;
    assert!(subscriptions.contains(&command_topic()));
    assert!(subscriptions.contains(&TopicBuilder::config_topic(PROJECT_ID, SENSOR_ID)));
}

#[tokio::test(start_paused = true)]
async fn test_initialize_passes_credentials_to_link() {
    let link = MockLink::connected();
    let (mut sdk, _pubsub, _api) = build_sdk(link.clone());

    sdk.initialize("office-wifi", "hunter2").await.unwrap();

    assert_eq!(
        link.get_credentials().await,
        Some(("office-wifi".to_string(), "hunter2".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_initialize_fails_after_poll_budget() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::never());

    let result = sdk.initialize("YourWiFiSSID", "YourWiFiPassword").await;

    match result {
        Err(SdkError::Connectivity { attempts }) => assert_eq!(attempts, 20),
        other => panic!("expected Connectivity, got {other:?}"),
    }

    // No broker connect may be attempted when the link never comes up.
    assert_eq!(
        pubsub
            .connect_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
    assert!(!sdk.broker_connected());
}

#[tokio::test(start_paused = true)]
async fn test_initialize_surfaces_broker_rejection() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());
    pubsub
        .fail_connect
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let result = sdk.initialize("ssid", "password").await;

    assert!(matches!(result, Err(SdkError::BrokerConnect { .. })));
    assert!(!sdk.broker_connected());
}

#[tokio::test(start_paused = true)]
async fn test_client_id_carries_sensor_id_and_token() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());

    sdk.initialize("ssid", "password").await.unwrap();

    let ids = pubsub.connect_client_ids.lock().await.clone();
    assert_eq!(ids.len(), 1);
    assert!(ids[0].starts_with(&format!("twin-sdk-{SENSOR_ID}-")));
}

// ========== send_data / send_reading ==========

#[tokio::test(start_paused = true)]
async fn test_send_data_fails_when_broker_marked_disconnected() {
    let (sdk, pubsub, _api) = build_sdk(MockLink::connected());

    let result = sdk.send_data(r#"{"temperature": 21.0}"#).await;

    assert!(matches!(
        result,
        Err(SdkError::NotConnected { link: Link::Broker })
    ));
    assert!(pubsub.get_published().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_reading_builds_envelope() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());
    sdk.initialize("ssid", "password").await.unwrap();

    tokio::time::advance(Duration::from_millis(12_500)).await;
    sdk.send_reading(25.5, Some("C")).await.unwrap();

    let envelopes = published_envelopes(&pubsub).await;
    assert_eq!(envelopes.len(), 1);

    let (topic, envelope) = &envelopes[0];
    assert_eq!(topic, &data_topic());
    assert_eq!(envelope["sensorId"], SENSOR_ID);
    assert_eq!(envelope["timestamp"], 12_500);
    assert_eq!(envelope["reading"], json!({"value": 25.5, "unit": "C"}));
}

#[tokio::test(start_paused = true)]
async fn test_send_value_omits_unit() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());
    sdk.initialize("ssid", "password").await.unwrap();

    sdk.send_value(42.0).await.unwrap();

    let envelopes = published_envelopes(&pubsub).await;
    assert_eq!(envelopes[0].1["reading"], json!({"value": 42.0}));
}

#[tokio::test(start_paused = true)]
async fn test_send_data_rejects_malformed_json() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());
    sdk.initialize("ssid", "password").await.unwrap();

    let result = sdk.send_data("{not valid json").await;

    assert!(matches!(result, Err(SdkError::InvalidPayload(_))));
    assert!(pubsub.get_published().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_batch_publishes_each_reading() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());
    sdk.initialize("ssid", "password").await.unwrap();

    sdk.send_batch(&[json!({"a": 1}), json!({"b": 2})])
        .await
        .unwrap();

    let envelopes = published_envelopes(&pubsub).await;
    assert_eq!(envelopes.len(), 2);
    assert_eq!(envelopes[0].1["reading"], json!({"a": 1}));
    assert_eq!(envelopes[1].1["reading"], json!({"b": 2}));
}

// ========== registration ==========

#[tokio::test(start_paused = true)]
async fn test_register_sensor_succeeds_on_200() {
    let (sdk, _pubsub, api) = build_sdk(MockLink::connected());

    let result = sdk
        .register_sensor("temperature", SensorMetadata::default())
        .await;

    assert!(result.is_ok());
    let registrations = api.get_registrations().await;
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].sensor_type, "temperature");
    assert_eq!(registrations[0].sensor_id, SENSOR_ID);
}

#[tokio::test(start_paused = true)]
async fn test_register_sensor_carries_failure_status() {
    let link = MockLink::connected();
    let pubsub = MockPubSub::new();
    let api = MockApiClient::with_register_status(500);
    let sdk = TwinSdk::new(test_config(), link, pubsub, api);

    let result = sdk
        .register_sensor("temperature", SensorMetadata::default())
        .await;

    assert!(matches!(
        result,
        Err(SdkError::Registration { status: 500 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_register_sensor_requires_network_link() {
    let (sdk, _pubsub, api) = build_sdk(MockLink::never());

    let result = sdk
        .register_sensor("temperature", SensorMetadata::default())
        .await;

    assert!(matches!(
        result,
        Err(SdkError::NotConnected {
            link: Link::Network
        })
    ));
    assert!(api.get_registrations().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_register_sensor_merges_caller_metadata() {
    let (sdk, _pubsub, api) = build_sdk(MockLink::connected());

    let metadata = SensorMetadata {
        name: "office-temp".to_string(),
        location: "Office".to_string(),
        ..Default::default()
    };
    sdk.register_sensor("temperature", metadata).await.unwrap();

    let registered = &api.get_registrations().await[0].metadata;
    assert_eq!(registered.name, "office-temp");
    assert_eq!(registered.location, "Office");
    assert_eq!(registered.model, "Generic");
    assert_eq!(registered.firmware, "1.0.0");
}

#[tokio::test(start_paused = true)]
async fn test_register_sensor_defaults_name_to_sensor_id() {
    let (sdk, _pubsub, api) = build_sdk(MockLink::connected());

    sdk.register_sensor("temperature", SensorMetadata::default())
        .await
        .unwrap();

    assert_eq!(api.get_registrations().await[0].metadata.name, SENSOR_ID);
}

// ========== command dispatch ==========

#[tokio::test(start_paused = true)]
async fn test_command_on_command_topic_invokes_handler_once() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());

    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    sdk.set_command_handler(move |command| {
        sink.lock().unwrap().push(command.to_string());
    });

    sdk.initialize("ssid", "password").await.unwrap();

    pubsub
        .push_inbound(&command_topic(), br#"{"operation":"led_on"}"#)
        .await;
    sdk.maintain().await;

    let commands = received.lock().unwrap().clone();
    assert_eq!(commands, vec![r#"{"operation":"led_on"}"#.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_message_on_other_topic_never_invokes_command_handler() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());

    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    sdk.set_command_handler(move |command| {
        sink.lock().unwrap().push(command.to_string());
    });

    sdk.initialize("ssid", "password").await.unwrap();

    pubsub
        .push_inbound(&data_topic(), br#"{"operation":"led_on"}"#)
        .await;
    pubsub
        .push_inbound("sensors/other-project/other-sensor/status", b"{}")
        .await;
    sdk.maintain().await;

    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_config_topic_routes_to_config_handler() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());

    let configs: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = configs.clone();
    sdk.set_config_handler(move |doc| {
        sink.lock().unwrap().push(doc.to_string());
    });

    sdk.initialize("ssid", "password").await.unwrap();

    pubsub
        .push_inbound(
            &TopicBuilder::config_topic(PROJECT_ID, SENSOR_ID),
            br#"{"reportRate": 5}"#,
        )
        .await;
    sdk.maintain().await;

    assert_eq!(
        configs.lock().unwrap().clone(),
        vec![r#"{"reportRate": 5}"#.to_string()]
    );
}

// ========== maintain: heartbeat ==========

#[tokio::test(start_paused = true)]
async fn test_heartbeat_fires_once_per_interval() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());
    sdk.initialize("ssid", "password").await.unwrap();

    // First tick publishes the initial heartbeat.
    sdk.maintain().await;
    // An immediate second tick must not re-trigger it.
    sdk.maintain().await;

    let heartbeats = published_envelopes(&pubsub)
        .await
        .into_iter()
        .filter(|(_, envelope)| envelope["reading"] == json!({"heartbeat": true}))
        .count();
    assert_eq!(heartbeats, 1);

    // Past the interval it fires exactly once more.
    tokio::time::advance(Duration::from_millis(30_001)).await;
    sdk.maintain().await;
    sdk.maintain().await;

    let heartbeats = published_envelopes(&pubsub)
        .await
        .into_iter()
        .filter(|(_, envelope)| envelope["reading"] == json!({"heartbeat": true}))
        .count();
    assert_eq!(heartbeats, 2);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_failure_reports_to_error_handler() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());

    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    sdk.set_error_handler(move |e| {
        sink.lock().unwrap().push(e.to_string());
    });

    sdk.initialize("ssid", "password").await.unwrap();
    pubsub
        .fail_publish
        .store(true, std::sync::atomic::Ordering::SeqCst);

    sdk.maintain().await;
    assert_eq!(errors.lock().unwrap().len(), 1);

    // Timer was reset despite the failure; no immediate retry.
    sdk.maintain().await;
    assert_eq!(errors.lock().unwrap().len(), 1);
}

// ========== maintain: reconnect ==========

#[tokio::test(start_paused = true)]
async fn test_maintain_reconnects_and_resubscribes() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());
    sdk.initialize("ssid", "password").await.unwrap();
    pubsub.clear_history().await;

    // Broker drops the connection between ticks.
    pubsub.set_connected(false);
    sdk.maintain().await;

    assert!(sdk.broker_connected());
    assert_eq!(
        pubsub
            .connect_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
    assert!(pubsub.get_subscriptions().await.contains(&command_topic()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_reports_and_stays_down() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());

    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    sdk.set_error_handler(move |e| {
        sink.lock().unwrap().push(e.to_string());
    });

    sdk.initialize("ssid", "password").await.unwrap();

    pubsub.set_connected(false);
    pubsub
        .fail_connect
        .store(true, std::sync::atomic::Ordering::SeqCst);
    sdk.maintain().await;

    assert!(!sdk.broker_connected());
    assert!(errors
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.contains("broker rejected connection")));

    let result = sdk.send_data(r#"{"v": 1}"#).await;
    assert!(matches!(
        result,
        Err(SdkError::NotConnected { link: Link::Broker })
    ));
}

// ========== disconnect ==========

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_idempotent() {
    let (mut sdk, pubsub, _api) = build_sdk(MockLink::connected());

    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    sdk.set_error_handler(move |e| {
        sink.lock().unwrap().push(e.to_string());
    });

    sdk.initialize("ssid", "password").await.unwrap();

    sdk.disconnect().await;
    assert!(!sdk.broker_connected());
    assert!(!pubsub.is_connected());

    sdk.disconnect().await;
    assert!(!sdk.broker_connected());
    assert!(errors.lock().unwrap().is_empty());
}

// ========== HTTP fallback and config fetch ==========

#[tokio::test(start_paused = true)]
async fn test_send_data_via_api_ingests_envelope() {
    let (sdk, _pubsub, api) = build_sdk(MockLink::connected());

    sdk.send_data_via_api(r#"{"temperature": 21.5}"#)
        .await
        .unwrap();

    let ingested = api.get_ingested().await;
    assert_eq!(ingested.len(), 1);
    assert_eq!(ingested[0].sensor_id, SENSOR_ID);
    assert_eq!(ingested[0].reading, json!({"temperature": 21.5}));
}

#[tokio::test(start_paused = true)]
async fn test_send_data_via_api_rejects_malformed_json() {
    let (sdk, _pubsub, api) = build_sdk(MockLink::connected());

    let result = sdk.send_data_via_api("{oops").await;

    assert!(matches!(result, Err(SdkError::InvalidPayload(_))));
    assert!(api.get_ingested().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_sensor_config_returns_document() {
    let (sdk, _pubsub, api) = build_sdk(MockLink::connected());
    *api.config_doc.lock().await = json!({"reportRate": 5});

    let doc = sdk.fetch_sensor_config().await.unwrap();
    assert_eq!(doc, json!({"reportRate": 5}));
}
