use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::JsonValue;
use uuid::Uuid;

/// Per-user profile. `api_calls_count` is the usage counter of the current
/// billing period.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub api_calls_count: i64,
    pub theme_preference: String,
    pub company: String,
    pub job_title: String,
    pub phone: String,
    pub bio: String,
    pub notification_preferences: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
