use sqlx::types::JsonValue;
use uuid::Uuid;

pub struct UsageRecordCreate {
    pub user_id: Uuid,
    pub tool_id: Uuid,
    pub input_data: JsonValue,
    pub output_data: JsonValue,
    pub tokens_used: i64,
    pub cost_micros: i64,
    pub success: bool,
    pub error_message: String,
}
