use actix_web::{HttpMessage, HttpResponse, dev::ServiceRequest};
use base64::{Engine, engine::general_purpose};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Res};

const KEY_PREFIX: &str = "sk_";

/// Everything needed to authenticate an API call, packed into the key handed
/// to the user. Only the hash of `secret` is ever stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeyClaims {
    pub user_id: Uuid,
    pub key_id: Uuid,
    pub secret: String,
}

impl KeyClaims {
    pub fn new(user_id: Uuid, key_id: Uuid) -> Self {
        Self {
            user_id,
            key_id,
            secret: generate_secret(),
        }
    }

    pub fn to_key(&self) -> Res<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize key claims: {}", e)))?;
        let encoded = general_purpose::STANDARD.encode(json);
        Ok(format!("{}{}", KEY_PREFIX, encoded))
    }

    pub fn from_key(key: &str) -> Res<Self> {
        let encoded = key
            .strip_prefix(KEY_PREFIX)
            .ok_or_else(|| AppError::BadRequest("Missing prefix 'sk_'".to_string()))?;

        let decoded_bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AppError::BadRequest(format!("Base64 decode error: {}", e)))?;

        let claims = serde_json::from_slice(&decoded_bytes)
            .map_err(|e| AppError::BadRequest(format!("JSON parse error: {}", e)))?;

        Ok(claims)
    }
}

/// Random secret embedded in a freshly issued key.
pub fn generate_secret() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn get_key_claims_or_error(req: &ServiceRequest) -> Result<KeyClaims, HttpResponse> {
    if let Some(key_claims_res) = req.extensions().get::<Res<KeyClaims>>() {
        match key_claims_res {
            Ok(claims) => Ok(claims.clone()),
            Err(app_error) => Err(app_error.to_http_response()),
        }
    } else {
        Err(AppError::Unauthorized("No API key provided".to_string()).to_http_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_carries_its_claims() {
        let claims = KeyClaims::new(Uuid::new_v4(), Uuid::new_v4());
        let key = claims.to_key().unwrap();

        assert!(key.starts_with("sk_"));
        assert_eq!(KeyClaims::from_key(&key).unwrap(), claims);
    }

    #[test]
    fn key_without_prefix_is_bad_request() {
        assert!(matches!(
            KeyClaims::from_key("pk_abc"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn garbage_payload_is_bad_request() {
        assert!(matches!(
            KeyClaims::from_key("sk_not-base64!!"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn secrets_are_not_reused() {
        assert_ne!(generate_secret(), generate_secret());
    }
}
