//! Error types for SDK operations
//!
//! Every fallible SDK operation returns [`SdkResult`]; callers must check
//! the result before assuming the operation took effect. There is no retry
//! machinery here; transient failures simply resurface on the next
//! `maintain` tick.

use thiserror::Error;

/// Which link an operation required but found down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The underlying network connection (WiFi or equivalent).
    Network,
    /// The MQTT broker connection.
    Broker,
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Link::Network => write!(f, "network"),
            Link::Broker => write!(f, "broker"),
        }
    }
}

/// Main error type for SDK operations
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("network link failed to come up after {attempts} status polls")]
    Connectivity { attempts: u32 },

    #[error("broker rejected connection: {reason}")]
    BrokerConnect { reason: String },

    #[error("{link} link is not connected")]
    NotConnected { link: Link },

    #[error("registration rejected with HTTP status {status}")]
    Registration { status: u16 },

    #[error("API request failed with HTTP status {status}")]
    Api { status: u16 },

    #[error("invalid reading payload")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("publish failed")]
    Publish(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("subscription failed")]
    Subscribe(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("serialization error")]
    Serialization(#[source] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl SdkError {
    /// Create a connectivity error after an exhausted poll budget
    pub fn connectivity(attempts: u32) -> Self {
        Self::Connectivity { attempts }
    }

    /// Create a broker connect error carrying the broker's reason
    pub fn broker_connect<S: Into<String>>(reason: S) -> Self {
        Self::BrokerConnect {
            reason: reason.into(),
        }
    }

    /// Create a not-connected error for the given link
    pub fn not_connected(link: Link) -> Self {
        Self::NotConnected { link }
    }

    /// Create a registration error carrying the HTTP status code
    pub fn registration(status: u16) -> Self {
        Self::Registration { status }
    }

    /// Create a publish error from any transport-level failure
    pub fn publish<E: std::error::Error + Send + Sync + 'static>(source: E) -> Self {
        Self::Publish(Box::new(source))
    }

    /// Create a subscription error from any transport-level failure
    pub fn subscribe<E: std::error::Error + Send + Sync + 'static>(source: E) -> Self {
        Self::Subscribe(Box::new(source))
    }
}

/// Result type for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_error_display() {
        let error = SdkError::connectivity(20);
        assert_eq!(
            error.to_string(),
            "network link failed to come up after 20 status polls"
        );
    }

    #[test]
    fn test_broker_connect_error_display() {
        let error = SdkError::broker_connect("NotAuthorized");
        assert!(matches!(error, SdkError::BrokerConnect { .. }));
        assert_eq!(
            error.to_string(),
            "broker rejected connection: NotAuthorized"
        );
    }

    #[test]
    fn test_not_connected_names_the_link() {
        assert_eq!(
            SdkError::not_connected(Link::Network).to_string(),
            "network link is not connected"
        );
        assert_eq!(
            SdkError::not_connected(Link::Broker).to_string(),
            "broker link is not connected"
        );
    }

    #[test]
    fn test_registration_error_carries_status() {
        let error = SdkError::registration(403);
        assert!(matches!(error, SdkError::Registration { status: 403 }));
        assert!(error.to_string().contains("403"));
    }

    #[test]
    fn test_invalid_payload_keeps_source() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = SdkError::InvalidPayload(parse_err);
        assert!(std::error::Error::source(&error).is_some());
    }
}
