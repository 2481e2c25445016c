use std::collections::HashMap;

use chrono::Utc;
use common::error::{AppError, Res};
use db::models::{invoice::InvoiceStatus, subscription::SubscriptionStatus};
use sqlx::PgPool;
use stripe::{
    Client, CreatePaymentIntent, Currency, Event, EventObject, EventType, PaymentIntent, Webhook,
};
use uuid::Uuid;

use crate::dtos::pay::PaymentIntentResponse;

/// Creates a payment intent for an open invoice of the user and remembers
/// its id on the invoice.
pub async fn create_invoice_intent(
    client: &Client,
    pool: &PgPool,
    user_id: Uuid,
    invoice_id: Uuid,
) -> Res<PaymentIntentResponse> {
    let invoice = db::invoice::get_user_invoice(pool, user_id, invoice_id).await?;
    if invoice.status != InvoiceStatus::Open {
        return Err(AppError::BadRequest(format!(
            "Invoice {} is not open for payment",
            invoice.display_number()
        )));
    }

    let currency = parse_currency(&invoice.currency)?;

    let description = format!("Invoice {}", invoice.display_number());
    let mut params = CreatePaymentIntent::new(invoice.amount_cents, currency);
    params.description = Some(&description);
    params.metadata = Some(HashMap::from([
        ("invoice_id".to_string(), invoice.id.to_string()),
        ("user_id".to_string(), user_id.to_string()),
    ]));

    let intent = PaymentIntent::create(client, params).await?;
    db::invoice::set_payment_intent(pool, invoice.id, intent.id.as_str()).await?;

    Ok(PaymentIntentResponse {
        invoice_id: invoice.id,
        invoice_number: invoice.display_number(),
        payment_intent_id: intent.id.to_string(),
        client_secret: intent.client_secret,
        amount_cents: invoice.amount_cents,
        currency: invoice.currency,
    })
}

/// Maps an ISO code such as `usd` onto the gateway's currency type.
pub fn parse_currency(code: &str) -> Res<Currency> {
    serde_json::from_value(serde_json::Value::String(code.to_lowercase()))
        .map_err(|_| AppError::Internal(format!("Unsupported currency '{}'", code)))
}

/// Creates an event for the webhook based on the request payload and signature.
/// Requires a webhook secret key.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    Webhook::construct_event(payload, signature, webhook_secret).map_err(|e| {
        log::error!("Error constructing webhook event: {}", e);
        AppError::BadRequest(format!("Webhook Error: {}", e))
    })
}

/// Invoice status a payment intent event settles on, if any.
pub fn settled_status(event_type: EventType) -> Option<InvoiceStatus> {
    match event_type {
        EventType::PaymentIntentSucceeded => Some(InvoiceStatus::Paid),
        EventType::PaymentIntentPaymentFailed => Some(InvoiceStatus::Failed),
        _ => None,
    }
}

/// Applies a verified webhook event. Only status fields are written: the
/// invoice becomes paid or failed, and a failed payment marks the owning
/// subscription past due.
pub async fn process_webhook_event(pool: &PgPool, event: Event) -> Res<()> {
    log::info!("Processing webhook event: {}", event.type_);

    let Some(status) = settled_status(event.type_) else {
        log::info!("Unhandled event type: {}", event.type_);
        return Ok(());
    };
    let EventObject::PaymentIntent(intent) = event.data.object else {
        return Err(AppError::BadRequest(
            "Payment intent event without a payment intent".to_string(),
        ));
    };

    let mut tx = pool.begin().await?;
    let Some(invoice) =
        db::invoice::get_invoice_by_payment_intent(&mut *tx, intent.id.as_str()).await?
    else {
        log::warn!("No invoice for payment intent {}", intent.id);
        return Ok(());
    };

    let paid_at = (status == InvoiceStatus::Paid).then(Utc::now);
    db::invoice::update_invoice_status(&mut *tx, invoice.id, status, paid_at).await?;

    if status == InvoiceStatus::Failed {
        if let Some(subscription_id) = invoice.subscription_id {
            db::subscription::update_status(&mut *tx, subscription_id, SubscriptionStatus::PastDue)
                .await?;
        }
    }
    tx.commit().await?;

    log::info!(
        "Invoice {} is now {:?} (payment intent {})",
        invoice.display_number(),
        status,
        intent.id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_payment_intent_outcomes_settle_invoices() {
        assert_eq!(
            settled_status(EventType::PaymentIntentSucceeded),
            Some(InvoiceStatus::Paid)
        );
        assert_eq!(
            settled_status(EventType::PaymentIntentPaymentFailed),
            Some(InvoiceStatus::Failed)
        );
        assert_eq!(settled_status(EventType::CustomerCreated), None);
    }

    #[test]
    fn currency_codes_are_case_insensitive() {
        assert_eq!(parse_currency("USD").unwrap(), Currency::USD);
        assert_eq!(parse_currency("eur").unwrap(), Currency::EUR);
    }

    #[test]
    fn unsigned_payload_is_rejected() {
        let res = construct_event("{}", "t=1,v1=deadbeef", "whsec_test");
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }
}
