use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}
