use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{dtos::key::KeyCreateRequest, models::key::ApiKey};

pub async fn get_key_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    key_id: &Uuid,
) -> Res<Option<ApiKey>> {
    sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = $1")
        .bind(key_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_active_keys_by_user_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: &Uuid,
) -> Res<Vec<ApiKey>> {
    sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE user_id = $1 AND status = 'active' ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_key<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: KeyCreateRequest,
) -> Res<ApiKey> {
    sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (id, user_id, key_hashed, name, status)
        VALUES ($1, $2, $3, $4, 'active')
        RETURNING *
        "#,
    )
    .bind(data.id)
    .bind(data.user_id)
    .bind(data.key_hashed)
    .bind(data.name)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Revokes a key owned by `user_id`. Returns `None` if no such key exists.
pub async fn revoke_user_key<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    key_id: Uuid,
) -> Res<Option<ApiKey>> {
    sqlx::query_as::<_, ApiKey>(
        "UPDATE api_keys SET status = 'revoked' WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(key_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn touch_last_used<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    key_id: Uuid,
) -> Res<()> {
    sqlx::query("UPDATE api_keys SET last_used = now() WHERE id = $1")
        .bind(key_id)
        .execute(executor)
        .await?;
    Ok(())
}
