use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::usage::UsageRecordCreate,
    models::usage::{MonthlyUsage, ToolUsage, ToolUsageStat, UsageTotals},
};

/// Appends a usage record. Records are never updated afterwards.
pub async fn insert_usage_record<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: UsageRecordCreate,
) -> Res<ToolUsage> {
    sqlx::query_as::<_, ToolUsage>(
        r#"
        INSERT INTO tool_usages
            (user_id, tool_id, input_data, output_data,
             tokens_used, cost_micros, success, error_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.tool_id)
    .bind(data.input_data)
    .bind(data.output_data)
    .bind(data.tokens_used)
    .bind(data.cost_micros)
    .bind(data.success)
    .bind(data.error_message)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_recent_usages<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    tool_id: Option<Uuid>,
    limit: i64,
) -> Res<Vec<ToolUsage>> {
    sqlx::query_as::<_, ToolUsage>(
        r#"
        SELECT * FROM tool_usages
        WHERE user_id = $1 AND ($2::UUID IS NULL OR tool_id = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(tool_id)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_usage_totals<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Res<UsageTotals> {
    sqlx::query_as::<_, UsageTotals>(
        r#"
        SELECT COUNT(*) AS calls,
               COALESCE(SUM(tokens_used), 0)::BIGINT AS total_tokens,
               COALESCE(SUM(cost_micros), 0)::BIGINT AS total_cost_micros
        FROM tool_usages
        WHERE user_id = $1 AND created_at >= $2
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_top_tools<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    since: DateTime<Utc>,
    limit: i64,
) -> Res<Vec<ToolUsageStat>> {
    sqlx::query_as::<_, ToolUsageStat>(
        r#"
        SELECT t.name AS tool_name,
               COUNT(*) AS total_uses,
               COALESCE(SUM(u.tokens_used), 0)::BIGINT AS total_tokens,
               COALESCE(SUM(u.cost_micros), 0)::BIGINT AS total_cost_micros
        FROM tool_usages u
        JOIN tools t ON t.id = u.tool_id
        WHERE u.user_id = $1 AND u.created_at >= $2
        GROUP BY t.name
        ORDER BY total_uses DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(since)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Per-tool totals over the user's whole history, most used first.
pub async fn get_tool_totals<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<ToolUsageStat>> {
    sqlx::query_as::<_, ToolUsageStat>(
        r#"
        SELECT t.name AS tool_name,
               COUNT(*) AS total_uses,
               COALESCE(SUM(u.tokens_used), 0)::BIGINT AS total_tokens,
               COALESCE(SUM(u.cost_micros), 0)::BIGINT AS total_cost_micros
        FROM tool_usages u
        JOIN tools t ON t.id = u.tool_id
        WHERE u.user_id = $1
        GROUP BY t.name
        ORDER BY total_uses DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Calendar-month buckets of the user's usage since `since`, oldest first.
/// Months without usage are absent.
pub async fn get_monthly_usage<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Res<Vec<MonthlyUsage>> {
    sqlx::query_as::<_, MonthlyUsage>(
        r#"
        SELECT date_trunc('month', created_at) AS month,
               COUNT(*) AS calls,
               COALESCE(SUM(tokens_used), 0)::BIGINT AS total_tokens,
               COALESCE(SUM(cost_micros), 0)::BIGINT AS total_cost_micros
        FROM tool_usages
        WHERE user_id = $1 AND created_at >= $2
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn count_user_usages<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tool_usages WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}
