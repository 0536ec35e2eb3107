//! Wire documents exchanged with the telemetry service
//!
//! Field names are camelCase on the wire to match the platform API. The
//! [`DataEnvelope`] wraps every published reading (including heartbeats) with
//! the sensor identity and a device-uptime timestamp.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outer structure wrapping a sensor reading before publishing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataEnvelope {
    pub sensor_id: String,
    /// Milliseconds since the SDK instance was constructed.
    pub timestamp: u64,
    /// Caller-supplied reading, carried verbatim.
    pub reading: Value,
}

/// Minimal reading fragment for the value/unit convenience path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Reading {
    pub fn new(value: f64, unit: Option<&str>) -> Self {
        Self {
            value,
            unit: unit.map(str::to_string),
        }
    }
}

/// Fixed heartbeat payload, published through the normal envelope path.
pub fn heartbeat() -> Value {
    serde_json::json!({ "heartbeat": true })
}

/// Body of `POST /sensors/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub sensor_type: String,
    pub sensor_id: String,
    pub metadata: SensorMetadata,
}

/// Descriptive metadata sent at registration time.
///
/// Caller-set fields override the defaults; an empty `name` is filled with
/// the sensor id when the request is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorMetadata {
    #[serde(default)]
    pub name: String,
    pub location: String,
    pub model: String,
    pub firmware: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Default for SensorMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            location: "Unknown".to_string(),
            model: "Generic".to_string(),
            firmware: "1.0.0".to_string(),
            tags: Vec::new(),
            capabilities: Vec::new(),
        }
    }
}

impl SensorMetadata {
    /// Fill the name slot from the sensor id when the caller left it empty.
    pub fn resolved_for(mut self, sensor_id: &str) -> Self {
        if self.name.is_empty() {
            self.name = sensor_id.to_string();
        }
        self
    }
}
