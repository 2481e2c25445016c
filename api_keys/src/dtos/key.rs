use chrono::{DateTime, Utc};
use db::models::key::ApiKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_KEY_NAME: &str = "Default Key";

#[derive(Debug, Deserialize, Default)]
pub struct CreateKeyRequest {
    pub name: Option<String>,
}

impl CreateKeyRequest {
    pub fn name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_KEY_NAME)
            .to_string()
    }
}

/// Returned once, when the key is issued. `key` is never shown again.
#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl CreateKeyResponse {
    pub fn new(record: ApiKey, key: String) -> Self {
        Self {
            id: record.id,
            key,
            name: record.name,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_fall_back_to_default() {
        assert_eq!(CreateKeyRequest { name: None }.name(), "Default Key");
        assert_eq!(
            CreateKeyRequest {
                name: Some("   ".to_string())
            }
            .name(),
            "Default Key"
        );
        assert_eq!(
            CreateKeyRequest {
                name: Some(" ci ".to_string())
            }
            .name(),
            "ci"
        );
    }
}
