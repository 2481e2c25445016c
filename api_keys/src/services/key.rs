use common::{
    error::{AppError, Res},
    key::KeyClaims,
    misc::hash_str,
};
use db::{dtos::key::KeyCreateRequest, models::key::ApiKey};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dtos::key::{CreateKeyRequest, CreateKeyResponse};

pub async fn get_keys(pool: &PgPool, user_id: Uuid) -> Res<Vec<ApiKey>> {
    db::key::get_active_keys_by_user_id(pool, &user_id).await
}

/// Issues a key for `user_id`. The plaintext key is part of the response
/// and nowhere else; only the argon2 hash of its secret is persisted.
pub async fn create_key(
    pool: &PgPool,
    user_id: Uuid,
    req: CreateKeyRequest,
) -> Res<CreateKeyResponse> {
    let claims = KeyClaims::new(user_id, Uuid::new_v4());
    let key_hashed = hash_str(&claims.secret)?;

    let record = db::key::insert_key(
        pool,
        KeyCreateRequest {
            id: claims.key_id,
            user_id,
            key_hashed,
            name: req.name(),
        },
    )
    .await?;

    log::info!("Issued API key {} for user {}", record.id, user_id);
    Ok(CreateKeyResponse::new(record, claims.to_key()?))
}

pub async fn revoke_key(pool: &PgPool, user_id: Uuid, key_id: Uuid) -> Res<ApiKey> {
    let key = db::key::revoke_user_key(pool, user_id, key_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("API key {} not found", key_id)))?;
    log::info!("Revoked API key {} of user {}", key_id, user_id);
    Ok(key)
}
