use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::subscription::SubscriptionCreateRequest,
    models::subscription::{Subscription, SubscriptionDetails, SubscriptionStatus},
};

const DETAILS_QUERY: &str = r#"
    SELECT s.*,
           p.slug AS plan_slug,
           p.name AS plan_name,
           p.price_cents AS plan_price_cents,
           p.currency AS plan_currency,
           p.api_calls_limit
    FROM subscriptions s
    JOIN plans p ON p.id = s.plan_id
    WHERE s.user_id = $1
"#;

pub async fn get_subscription_by_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_subscription_details<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<SubscriptionDetails>> {
    sqlx::query_as::<_, SubscriptionDetails>(DETAILS_QUERY)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn insert_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriptionCreateRequest,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (user_id, plan_id, status, start_date, end_date)
        VALUES ($1, $2, 'active', $3, $4)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.plan_id)
    .bind(data.start_date)
    .bind(data.end_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Reuses the user's single subscription row for a brand new subscription.
pub async fn restart_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriptionCreateRequest,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET plan_id = $2,
            status = 'active',
            start_date = $3,
            end_date = $4,
            cancel_at_period_end = FALSE,
            updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.plan_id)
    .bind(data.start_date)
    .bind(data.end_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_plan<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    plan_id: Uuid,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        "UPDATE subscriptions SET plan_id = $2, updated_at = now() WHERE user_id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(plan_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Flips `cancel_at_period_end` on the user's active subscription.
/// Returns `None` when there is no active subscription.
pub async fn set_cancel_at_period_end<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    cancel: bool,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET cancel_at_period_end = $2, updated_at = now()
        WHERE user_id = $1 AND status = 'active'
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(cancel)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_period<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE subscriptions
        SET start_date = $2, end_date = $3, updated_at = now()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(start_date)
    .bind(end_date)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
    status: SubscriptionStatus,
) -> Res<()> {
    sqlx::query("UPDATE subscriptions SET status = $2, updated_at = now() WHERE id = $1")
        .bind(subscription_id)
        .bind(status)
        .execute(executor)
        .await?;
    Ok(())
}

/// Users whose active subscription period ended before `now`.
pub async fn get_users_due_for_rollover<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    now: DateTime<Utc>,
) -> Res<Vec<Uuid>> {
    sqlx::query_scalar(
        "SELECT user_id FROM subscriptions \
         WHERE status = 'active' AND end_date < $1 ORDER BY end_date",
    )
    .bind(now)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
