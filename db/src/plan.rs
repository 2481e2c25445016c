use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};

use crate::models::plan::Plan;

pub async fn get_active_plans<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<Vec<Plan>> {
    sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE is_active ORDER BY price_cents")
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_active_plan_by_slug<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    slug: &str,
) -> Res<Plan> {
    sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE slug = $1 AND is_active")
        .bind(slug)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plan '{}' not found", slug)))
}
