//! Pure connection pieces for the MQTT client
//!
//! Broker settings parsing, connection state, client-id generation, and
//! MQTT option construction. Everything here is synchronous and testable
//! without a broker.

use std::time::Duration;

use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use url::Url;

use crate::error::SdkError;

/// Parsed broker endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub connect_timeout: Duration,
}

impl BrokerSettings {
    /// Parse a broker URL. `mqtt://` defaults to port 1883, `mqtts://` to
    /// 8883 with TLS enabled.
    pub fn from_url(broker_url: &str, connect_timeout: Duration) -> Result<Self, SdkError> {
        let url = Url::parse(broker_url)
            .map_err(|_| SdkError::InvalidBrokerUrl(broker_url.to_string()))?;

        let host = url
            .host_str()
            .ok_or_else(|| SdkError::InvalidBrokerUrl(broker_url.to_string()))?
            .to_string();
        let tls = url.scheme() == "mqtts";
        let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

        Ok(Self {
            host,
            port,
            tls,
            connect_timeout,
        })
    }
}

/// Connection state reported by the event pump
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - waiting for the broker's ConnAck
    Connecting,
    /// Successfully connected and ready for operations
    Connected,
    /// Broker refused the connection, with its reason code
    Rejected(String),
    /// Connection lost or closed, with reason
    Disconnected(String),
}

/// Generate a client id with a uniqueness token so restarts never collide
/// with the broker's session for the previous incarnation.
pub fn client_id(sensor_id: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis();
    format!("twin-sdk-{sensor_id}-{timestamp}")
}

/// Build MQTT options for one connection attempt
pub fn mqtt_options(client_id: &str, settings: &BrokerSettings) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, &settings.host, settings.port);

    if settings.tls {
        options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    options.set_keep_alive(Duration::from_secs(60));
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_broker_url_defaults() {
        let plain = BrokerSettings::from_url("mqtt://broker.example.com", TIMEOUT).unwrap();
        assert_eq!(plain.host, "broker.example.com");
        assert_eq!(plain.port, 1883);
        assert!(!plain.tls);

        let secure = BrokerSettings::from_url("mqtts://broker.example.com", TIMEOUT).unwrap();
        assert_eq!(secure.port, 8883);
        assert!(secure.tls);
    }

    #[test]
    fn test_broker_url_explicit_port() {
        let settings = BrokerSettings::from_url("mqtt://localhost:2883", TIMEOUT).unwrap();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 2883);
    }

    #[test]
    fn test_invalid_broker_url() {
        let result = BrokerSettings::from_url("not-a-url", TIMEOUT);
        assert!(matches!(result, Err(SdkError::InvalidBrokerUrl(_))));
    }

    #[test]
    fn test_client_id_scheme() {
        let id = client_id("esp32-sensor-01");
        assert!(id.starts_with("twin-sdk-esp32-sensor-01-"));

        // The uniqueness token makes consecutive ids distinct across restarts;
        // two calls in the same millisecond may legitimately collide.
        let suffix = id.rsplit('-').next().unwrap();
        assert!(suffix.parse::<u128>().is_ok());
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(
            ConnectionState::Connected,
            ConnectionState::Disconnected("lost".to_string())
        );
        assert_eq!(
            ConnectionState::Rejected("NotAuthorized".to_string()),
            ConnectionState::Rejected("NotAuthorized".to_string())
        );
    }
}
