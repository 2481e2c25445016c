use std::sync::Arc;

use actix_web::{HttpRequest, Responder, post, web};
use common::{
    env_config::Config,
    error::{AppError, Res},
    http::Success,
    jwt::JwtClaims,
    stripe,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::services;

/// Handles payment gateway webhook events.
///
/// # Output
/// - Success: 200 OK once the event is applied
/// - Error: 400 Bad Request for a missing or invalid signature
///
/// # Note
/// Called by the gateway, not by the frontend. Configure
/// `https://yourapp.com/api/pay/webhook` in the gateway dashboard for the
/// `payment_intent.succeeded` and `payment_intent.payment_failed` events and
/// put the signing secret in `STRIPE_WEBHOOK_SECRET`.
#[post("/webhook")]
pub async fn post_webhook(
    payload: String,
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Stripe signature missing".to_string()))?;

    let event = services::pay::construct_event(&payload, signature, &config.stripe_webhook_secret)?;
    services::pay::process_webhook_event(&pool, event).await?;

    Success::ok("Webhook processed successfully")
}

/// Starts payment of an open invoice.
///
/// # Output
/// - Success: `{ invoice_id, invoice_number, payment_intent_id, client_secret,
///   amount_cents, currency }`
/// - Error: 404 for invoices of other users, 400 if the invoice is not open
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch(`/api/dashboard/pay/invoices/${invoiceId}/intent`, {
///   method: 'POST',
///   headers: { 'Authorization': `Bearer ${localStorage.getItem('authToken')}` }
/// });
/// const { client_secret } = await response.json();
/// // hand client_secret to the gateway's frontend SDK
/// ```
#[post("/invoices/{id}/intent")]
pub async fn post_invoice_intent(
    claims: web::ReqData<JwtClaims>,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let client = stripe::create_client(&config.stripe_secret_key);
    let intent =
        services::pay::create_invoice_intent(&client, &pool, claims.user_id, path.into_inner())
            .await?;
    Success::created(intent)
}
