use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};

use crate::models::tool::{Category, Tool};

pub async fn get_categories<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<Vec<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn count_active_tools<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    category_slug: Option<&str>,
) -> Res<i64> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM tools t
        JOIN categories c ON c.id = t.category_id
        WHERE t.status = 'active' AND ($1::TEXT IS NULL OR c.slug = $1)
        "#,
    )
    .bind(category_slug)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_active_tools<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    category_slug: Option<&str>,
    limit: i64,
    offset: i64,
) -> Res<Vec<Tool>> {
    sqlx::query_as::<_, Tool>(
        r#"
        SELECT t.*
        FROM tools t
        JOIN categories c ON c.id = t.category_id
        WHERE t.status = 'active' AND ($1::TEXT IS NULL OR c.slug = $1)
        ORDER BY t.name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(category_slug)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_active_tool_by_slug<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    slug: &str,
) -> Res<Tool> {
    sqlx::query_as::<_, Tool>("SELECT * FROM tools WHERE slug = $1 AND status = 'active'")
        .bind(slug)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tool '{}' not found", slug)))
}
