use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::JsonValue;
use uuid::Uuid;

/// Immutable record of one admitted and executed metered call.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ToolUsage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tool_id: Uuid,
    pub input_data: JsonValue,
    pub output_data: JsonValue,
    pub tokens_used: i64,
    pub cost_micros: i64,
    pub success: bool,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, sqlx::FromRow, Serialize)]
pub struct UsageTotals {
    pub calls: i64,
    pub total_tokens: i64,
    pub total_cost_micros: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ToolUsageStat {
    pub tool_name: String,
    pub total_uses: i64,
    pub total_tokens: i64,
    pub total_cost_micros: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct MonthlyUsage {
    pub month: DateTime<Utc>,
    pub calls: i64,
    pub total_tokens: i64,
    pub total_cost_micros: i64,
}
