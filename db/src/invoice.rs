use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::invoice::InvoiceCreateRequest,
    models::invoice::{Invoice, InvoiceStatus},
};

pub async fn insert_invoice<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: InvoiceCreateRequest,
) -> Res<Invoice> {
    sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (user_id, subscription_id, amount_cents, currency, status, due_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.subscription_id)
    .bind(data.amount_cents)
    .bind(data.currency)
    .bind(data.status)
    .bind(data.due_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_recent_invoices<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    limit: i64,
) -> Res<Vec<Invoice>> {
    sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_user_invoice<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    invoice_id: Uuid,
) -> Res<Invoice> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 AND user_id = $2")
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", invoice_id)))
}

pub async fn set_payment_intent<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    invoice_id: Uuid,
    payment_intent_id: &str,
) -> Res<()> {
    sqlx::query("UPDATE invoices SET payment_intent_id = $2, updated_at = now() WHERE id = $1")
        .bind(invoice_id)
        .bind(payment_intent_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Moves an invoice to `status`; `paid_at` is only kept for paid invoices.
/// Returns `None` when the invoice does not exist.
pub async fn update_invoice_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    invoice_id: Uuid,
    status: InvoiceStatus,
    paid_at: Option<DateTime<Utc>>,
) -> Res<Option<Invoice>> {
    sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices
        SET status = $2, paid_at = $3, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(invoice_id)
    .bind(status)
    .bind(paid_at)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_invoice_by_payment_intent<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    payment_intent_id: &str,
) -> Res<Option<Invoice>> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE payment_intent_id = $1")
        .bind(payment_intent_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}
