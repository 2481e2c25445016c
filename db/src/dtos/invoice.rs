use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::invoice::InvoiceStatus;

pub struct InvoiceCreateRequest {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
}
