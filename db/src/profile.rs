use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{dtos::user::ProfileUpdateRequest, models::profile::Profile};

/// Creates the profile (and with it the usage counter) for a new user.
pub async fn insert_profile<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Profile> {
    sqlx::query_as::<_, Profile>("INSERT INTO profiles (user_id) VALUES ($1) RETURNING *")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_profile<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Profile> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile for user {} not found", user_id)))
}

/// Locks the user's profile row until the surrounding transaction ends and
/// returns the current usage count. `None` when the user has no profile.
pub async fn lock_usage_count<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<i64>> {
    sqlx::query_scalar("SELECT api_calls_count FROM profiles WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn set_usage_count<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    count: i64,
) -> Res<()> {
    sqlx::query("UPDATE profiles SET api_calls_count = $2, updated_at = now() WHERE user_id = $1")
        .bind(user_id)
        .bind(count)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn update_profile<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    data: ProfileUpdateRequest,
) -> Res<Profile> {
    sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles
        SET theme_preference = COALESCE($2, theme_preference),
            company = COALESCE($3, company),
            job_title = COALESCE($4, job_title),
            phone = COALESCE($5, phone),
            bio = COALESCE($6, bio),
            notification_preferences = COALESCE($7, notification_preferences),
            updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(data.theme_preference)
    .bind(data.company)
    .bind(data.job_title)
    .bind(data.phone)
    .bind(data.bio)
    .bind(data.notification_preferences)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
