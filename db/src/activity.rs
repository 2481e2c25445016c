use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::activity::UserActivity;

pub async fn insert_activity<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    activity_type: &str,
    description: &str,
) -> Res<()> {
    sqlx::query(
        "INSERT INTO user_activities (user_id, activity_type, description) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(activity_type)
    .bind(description)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_recent_activities<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    limit: i64,
) -> Res<Vec<UserActivity>> {
    sqlx::query_as::<_, UserActivity>(
        "SELECT * FROM user_activities WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
