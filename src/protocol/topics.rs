//! Topic construction and identity validation
//!
//! Topic names are scoped by project and sensor identity:
//! `sensors/{project_id}/{sensor_id}/{channel}`. Identities are validated at
//! configuration time so they cannot inject topic separators or MQTT
//! wildcards into the tree.

use thiserror::Error;

/// Builds the well-known topic names for one sensor identity.
pub struct TopicBuilder;

impl TopicBuilder {
    /// Data topic: `sensors/{project_id}/{sensor_id}/data`
    pub fn data_topic(project_id: &str, sensor_id: &str) -> String {
        format!("sensors/{project_id}/{sensor_id}/data")
    }

    /// Command topic: `sensors/{project_id}/{sensor_id}/commands`
    pub fn command_topic(project_id: &str, sensor_id: &str) -> String {
        format!("sensors/{project_id}/{sensor_id}/commands")
    }

    /// Config topic: `sensors/{project_id}/{sensor_id}/config`
    pub fn config_topic(project_id: &str, sensor_id: &str) -> String {
        format!("sensors/{project_id}/{sensor_id}/config")
    }
}

pub fn validate_identity(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyIdentity);
    }

    for ch in id.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '.' && ch != '_' && ch != '-' {
            return Err(ValidationError::InvalidIdentityChar(ch));
        }
    }

    Ok(())
}

/// Identity validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("identity cannot be empty")]
    EmptyIdentity,
    #[error("identity contains invalid character: '{0}'")]
    InvalidIdentityChar(char),
}
