//! Platform API client
//!
//! One-shot HTTP requests to the telemetry service: sensor registration,
//! the explicit HTTP ingest fallback, and sensor-config retrieval. All
//! requests carry the project token in the `X-Project-Token` header.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use crate::protocol::{DataEnvelope, RegistrationRequest};

const PROJECT_TOKEN_HEADER: &str = "X-Project-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP collaborator behind a trait for testability
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Register the sensor. Success is exactly HTTP 200; the parsed response
    /// body is returned to the caller.
    async fn register_sensor(&self, request: &RegistrationRequest) -> SdkResult<Value>;

    /// Push one envelope over HTTP instead of MQTT.
    async fn ingest_reading(&self, envelope: &DataEnvelope) -> SdkResult<()>;

    /// Fetch the server-side configuration document for a sensor.
    async fn fetch_sensor_config(&self, sensor_id: &str) -> SdkResult<Value>;
}

/// reqwest-backed [`ApiClient`]
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    project_token: String,
}

impl HttpApiClient {
    pub fn new(base_url: &str, project_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_token: project_token.to_string(),
        }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(&config.api.base_url, &config.identity.project_token)
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn register_sensor(&self, request: &RegistrationRequest) -> SdkResult<Value> {
        let url = format!("{}/sensors/register", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .header(PROJECT_TOKEN_HEADER, &self.project_token)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(SdkError::registration(status));
        }

        debug!(sensor_id = %request.sensor_id, "sensor registered");
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }

    async fn ingest_reading(&self, envelope: &DataEnvelope) -> SdkResult<()> {
        let url = format!("{}/data/ingest", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .header(PROJECT_TOKEN_HEADER, &self.project_token)
            .json(envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SdkError::Api {
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    async fn fetch_sensor_config(&self, sensor_id: &str) -> SdkResult<Value> {
        let url = format!("{}/sensors/{}/config", self.base_url, sensor_id);
        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .header(PROJECT_TOKEN_HEADER, &self.project_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SdkError::Api {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
