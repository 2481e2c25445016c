use db::models::tool::Tool;
use serde_json::{Value, json};

const PLACEHOLDER_TOKENS: i64 = 100;

/// What one tool run produced, before it is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    pub output: Value,
    pub tokens_used: i64,
    pub cost_micros: i64,
}

/// Runs a tool on caller input. Called after admission and outside any
/// quota lock, so implementations may take as long as the model does.
pub trait Processor: Send + Sync {
    fn process(&self, tool: &Tool, input: &Value) -> Result<ProcessOutput, String>;
}

/// Stands in for a model backend: fixed output, 100 tokens billed at the
/// tool's per-token rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderProcessor;

impl Processor for PlaceholderProcessor {
    fn process(&self, tool: &Tool, input: &Value) -> Result<ProcessOutput, String> {
        if !input.is_object() {
            return Err("Input must be a JSON object".to_string());
        }
        Ok(ProcessOutput {
            output: json!({ "result": "Processed result would go here" }),
            tokens_used: PLACEHOLDER_TOKENS,
            cost_micros: tool.cost_per_token_micros * PLACEHOLDER_TOKENS,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    pub(crate) fn tool(cost_per_token_micros: i64) -> Tool {
        let now = Utc::now();
        Tool {
            id: Uuid::new_v4(),
            name: "Code Reviewer".to_string(),
            slug: "code-reviewer".to_string(),
            description: String::new(),
            category_id: Uuid::new_v4(),
            model_name: "gpt-4".to_string(),
            input_format: json!({}),
            output_format: json!({}),
            max_tokens: 2000,
            cost_per_token_micros,
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cost_follows_the_tool_rate() {
        let out = PlaceholderProcessor
            .process(&tool(30), &json!({ "code": "fn main() {}" }))
            .unwrap();
        assert_eq!(out.tokens_used, 100);
        assert_eq!(out.cost_micros, 3000);
    }

    #[test]
    fn non_object_input_fails() {
        assert!(PlaceholderProcessor.process(&tool(30), &json!([1, 2])).is_err());
    }
}
