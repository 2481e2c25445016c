//! Idempotent sample catalog: pricing plans, tool categories and tools.

use common::error::Res;
use serde_json::{Value, json};
use sqlx::PgPool;

struct PlanSeed {
    name: &'static str,
    price_cents: i64,
    api_calls_limit: i64,
    features: Value,
}

struct CategorySeed {
    name: &'static str,
    icon: &'static str,
    description: &'static str,
}

struct ToolSeed {
    category: &'static str,
    name: &'static str,
    description: &'static str,
    model_name: &'static str,
    input_format: Value,
    output_format: Value,
    cost_per_token_micros: i64,
}

fn plans() -> Vec<PlanSeed> {
    vec![
        PlanSeed {
            name: "Free Tier",
            price_cents: 0,
            api_calls_limit: 100,
            features: json!({
                "max_tokens_per_request": 1000,
                "supported_models": ["gpt-3.5-turbo"],
                "priority_support": false,
                "custom_models": false
            }),
        },
        PlanSeed {
            name: "Basic Plan",
            price_cents: 2999,
            api_calls_limit: 1000,
            features: json!({
                "max_tokens_per_request": 2000,
                "supported_models": ["gpt-3.5-turbo", "gpt-4"],
                "priority_support": false,
                "custom_models": false
            }),
        },
        PlanSeed {
            name: "Professional Plan",
            price_cents: 9999,
            api_calls_limit: 5000,
            features: json!({
                "max_tokens_per_request": 4000,
                "supported_models": ["gpt-3.5-turbo", "gpt-4", "claude-v2"],
                "priority_support": true,
                "custom_models": false
            }),
        },
        PlanSeed {
            name: "Enterprise Plan",
            price_cents: 49999,
            api_calls_limit: 50000,
            features: json!({
                "max_tokens_per_request": 8000,
                "supported_models": ["gpt-3.5-turbo", "gpt-4", "claude-v2", "custom"],
                "priority_support": true,
                "custom_models": true
            }),
        },
    ]
}

fn categories() -> Vec<CategorySeed> {
    vec![
        CategorySeed {
            name: "Text Generation",
            icon: "fa-solid fa-pen-fancy",
            description: "AI tools for generating and manipulating text content",
        },
        CategorySeed {
            name: "Image Processing",
            icon: "fa-solid fa-image",
            description: "Tools for image generation, editing, and enhancement",
        },
        CategorySeed {
            name: "Code Assistant",
            icon: "fa-solid fa-code",
            description: "AI-powered coding and development tools",
        },
        CategorySeed {
            name: "Data Analysis",
            icon: "fa-solid fa-chart-line",
            description: "Tools for analyzing and visualizing data",
        },
    ]
}

fn object_schema(fields: &[(&str, &str)]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, ty)| (name.to_string(), json!({ "type": ty })))
        .collect();
    json!({ "type": "object", "properties": properties })
}

fn tools() -> Vec<ToolSeed> {
    vec![
        ToolSeed {
            category: "Text Generation",
            name: "Story Writer Pro",
            description: "Generate creative stories and narratives using AI",
            model_name: "gpt-4",
            input_format: object_schema(&[
                ("genre", "string"),
                ("length", "string"),
                ("theme", "string"),
            ]),
            output_format: object_schema(&[("title", "string"), ("story", "string")]),
            cost_per_token_micros: 15,
        },
        ToolSeed {
            category: "Image Processing",
            name: "AI Image Generator",
            description: "Create stunning images from text descriptions",
            model_name: "dall-e-3",
            input_format: object_schema(&[
                ("prompt", "string"),
                ("style", "string"),
                ("size", "string"),
            ]),
            output_format: object_schema(&[("image_url", "string")]),
            cost_per_token_micros: 80,
        },
        ToolSeed {
            category: "Code Assistant",
            name: "Code Reviewer",
            description: "AI-powered code review and suggestions",
            model_name: "gpt-4",
            input_format: object_schema(&[("code", "string"), ("language", "string")]),
            output_format: object_schema(&[("suggestions", "array"), ("improvements", "object")]),
            cost_per_token_micros: 30,
        },
        ToolSeed {
            category: "Data Analysis",
            name: "Data Insights",
            description: "Extract insights from your data using AI",
            model_name: "gpt-4",
            input_format: object_schema(&[("data", "array"), ("analysis_type", "string")]),
            output_format: object_schema(&[("insights", "array"), ("visualizations", "array")]),
            cost_per_token_micros: 25,
        },
    ]
}

/// Lowercases and joins alphanumeric runs with dashes: "Free Tier" -> "free-tier".
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Inserts the sample catalog. Rows that already exist are left untouched.
pub async fn sample_catalog(pool: &PgPool) -> Res<()> {
    let mut tx = pool.begin().await?;

    for plan in plans() {
        let inserted = sqlx::query(
            r#"
            INSERT INTO plans (slug, name, price_cents, api_calls_limit, features)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(slugify(plan.name))
        .bind(plan.name)
        .bind(plan.price_cents)
        .bind(plan.api_calls_limit)
        .bind(plan.features)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() > 0 {
            log::info!("Created plan: {}", plan.name);
        }
    }

    for category in categories() {
        sqlx::query(
            r#"
            INSERT INTO categories (name, slug, description, icon)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(category.name)
        .bind(slugify(category.name))
        .bind(category.description)
        .bind(category.icon)
        .execute(&mut *tx)
        .await?;
    }

    for tool in tools() {
        let inserted = sqlx::query(
            r#"
            INSERT INTO tools
                (name, slug, description, category_id, model_name,
                 input_format, output_format, cost_per_token_micros)
            SELECT $1, $2, $3, c.id, $5, $6, $7, $8
            FROM categories c
            WHERE c.slug = $4
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(tool.name)
        .bind(slugify(tool.name))
        .bind(tool.description)
        .bind(slugify(tool.category))
        .bind(tool.model_name)
        .bind(tool.input_format)
        .bind(tool.output_format)
        .bind(tool.cost_per_token_micros)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() > 0 {
            log::info!("Created tool: {}", tool.name);
        }
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_matches_catalog_slugs() {
        assert_eq!(slugify("Free Tier"), "free-tier");
        assert_eq!(slugify("AI Image Generator"), "ai-image-generator");
        assert_eq!(slugify("  Code -- Assistant "), "code-assistant");
    }

    #[test]
    fn every_tool_belongs_to_a_seeded_category() {
        let names: Vec<_> = categories().iter().map(|c| c.name).collect();
        assert!(tools().iter().all(|t| names.contains(&t.category)));
    }

    #[test]
    fn plan_limits_are_positive_and_grow_with_price() {
        let plans = plans();
        assert!(plans.iter().all(|p| p.api_calls_limit > 0));
        assert!(plans.windows(2).all(|w| {
            w[0].price_cents < w[1].price_cents && w[0].api_calls_limit < w[1].api_calls_limit
        }));
    }
}
