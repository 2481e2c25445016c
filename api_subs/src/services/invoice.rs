use chrono::NaiveDate;
use common::error::Res;
use db::{
    dtos::invoice::InvoiceCreateRequest,
    models::invoice::{Invoice, InvoiceStatus},
};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

/// Bills one period of a paid plan as an open invoice due on `due_date`.
pub async fn issue_open_invoice<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    subscription_id: Uuid,
    amount_cents: i64,
    currency: &str,
    due_date: NaiveDate,
) -> Res<Invoice> {
    let invoice = db::invoice::insert_invoice(
        executor,
        InvoiceCreateRequest {
            user_id,
            subscription_id: Some(subscription_id),
            amount_cents,
            currency: currency.to_string(),
            status: InvoiceStatus::Open,
            due_date,
        },
    )
    .await?;
    log::info!(
        "Issued invoice {} for user {} ({} {})",
        invoice.display_number(),
        user_id,
        amount_cents,
        currency
    );
    Ok(invoice)
}
