use common::error::{AppError, Res};
use db::{dtos::usage::UsageRecordCreate, models::tool::Tool};
use limiter::{gate::Gate, store::QuotaStore};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    dtos::tool::{Page, ProcessResponse, TOOLS_PER_PAGE, ToolDetailResponse, ToolListResponse},
    services::processor::{ProcessOutput, Processor},
};

const RECENT_TOOL_USAGE: i64 = 5;

pub async fn list_tools(
    pool: &PgPool,
    category: Option<String>,
    page: Option<i64>,
) -> Res<ToolListResponse> {
    let categories = db::tool::get_categories(pool).await?;
    let total = db::tool::count_active_tools(pool, category.as_deref()).await?;
    let page = Page::resolve(page, total, TOOLS_PER_PAGE);
    let tools =
        db::tool::get_active_tools(pool, category.as_deref(), page.per_page, page.offset()).await?;

    Ok(ToolListResponse {
        categories,
        selected_category: category,
        tools,
        has_next: page.has_next(),
        page,
    })
}

pub async fn get_tool(pool: &PgPool, user_id: Uuid, slug: &str) -> Res<ToolDetailResponse> {
    let tool = db::tool::get_active_tool_by_slug(pool, slug).await?;
    let recent_usage =
        db::usage::get_recent_usages(pool, user_id, Some(tool.id), RECENT_TOOL_USAGE).await?;
    Ok(ToolDetailResponse { tool, recent_usage })
}

/// Runs a metered tool call for `user_id`.
///
/// The gate admits or rejects first; a rejected call writes nothing. An
/// admitted call runs the processor outside the quota lock and then records
/// exactly one usage row, successful or not, with a matching activity.
pub async fn process_tool<S: QuotaStore, P: Processor>(
    pool: &PgPool,
    gate: &Gate<S>,
    processor: &P,
    user_id: Uuid,
    slug: &str,
    input: Value,
) -> Res<ProcessResponse> {
    let tool = db::tool::get_active_tool_by_slug(pool, slug).await?;
    let admission = gate.admit(user_id).await?;

    let result = processor.process(&tool, &input);
    let (activity_type, description) = activity_for(&tool, &result);

    let mut tx = pool.begin().await?;
    db::usage::insert_usage_record(&mut *tx, usage_record(user_id, &tool, input, &result)).await?;
    db::activity::insert_activity(&mut *tx, user_id, activity_type, &description).await?;
    tx.commit().await?;

    match result {
        Ok(out) => Ok(ProcessResponse {
            output: out.output,
            tokens_used: out.tokens_used,
            cost_micros: out.cost_micros,
            usage: admission.usage,
            limit: admission.limit,
        }),
        Err(message) => {
            log::warn!("Tool {} failed for user {}: {}", tool.slug, user_id, message);
            Err(AppError::BadRequest(message))
        }
    }
}

fn usage_record(
    user_id: Uuid,
    tool: &Tool,
    input: Value,
    result: &Result<ProcessOutput, String>,
) -> UsageRecordCreate {
    let (output_data, tokens_used, cost_micros, error_message) = match result {
        Ok(out) => (out.output.clone(), out.tokens_used, out.cost_micros, String::new()),
        Err(message) => (json!({}), 0, 0, message.clone()),
    };
    UsageRecordCreate {
        user_id,
        tool_id: tool.id,
        input_data: input,
        output_data,
        tokens_used,
        cost_micros,
        success: result.is_ok(),
        error_message,
    }
}

fn activity_for(tool: &Tool, result: &Result<ProcessOutput, String>) -> (&'static str, String) {
    match result {
        Ok(out) => (
            "tool_usage",
            format!("Used {} tool - {} tokens", tool.name, out.tokens_used),
        ),
        Err(message) => ("error", format!("Error using {} tool: {}", tool.name, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::processor::{PlaceholderProcessor, tests::tool};

    #[test]
    fn successful_run_is_recorded_with_cost() {
        let tool = tool(15);
        let input = json!({ "prompt": "a lighthouse" });
        let result = PlaceholderProcessor.process(&tool, &input);

        let record = usage_record(Uuid::new_v4(), &tool, input.clone(), &result);
        assert!(record.success);
        assert_eq!(record.tokens_used, 100);
        assert_eq!(record.cost_micros, 1500);
        assert_eq!(record.input_data, input);
        assert!(record.error_message.is_empty());

        let (kind, description) = activity_for(&tool, &result);
        assert_eq!(kind, "tool_usage");
        assert_eq!(description, "Used Code Reviewer tool - 100 tokens");
    }

    #[test]
    fn failed_run_is_recorded_without_cost() {
        let tool = tool(15);
        let result = PlaceholderProcessor.process(&tool, &json!("plain text"));

        let record = usage_record(Uuid::new_v4(), &tool, json!("plain text"), &result);
        assert!(!record.success);
        assert_eq!(record.cost_micros, 0);
        assert_eq!(record.error_message, "Input must be a JSON object");

        let (kind, description) = activity_for(&tool, &result);
        assert_eq!(kind, "error");
        assert!(description.starts_with("Error using Code Reviewer tool"));
    }

    mod metered {
        use std::{sync::Arc, time::Duration};

        use chrono::{Duration as ChronoDuration, Utc};
        use limiter::{gate::GatePolicy, store::postgres::PgQuotaStore};

        use super::*;

        const TOOL: &str = "code-reviewer";

        /// Seeded database from `TEST_DATABASE_URL`; skipped when unset.
        async fn test_gate() -> Option<(Arc<PgPool>, Gate<PgQuotaStore>)> {
            let url = std::env::var("TEST_DATABASE_URL").ok()?;
            let pool = PgPool::connect(&url).await.expect("connect to test database");
            db::migrate(&pool).await.expect("migrate test database");
            db::seed::sample_catalog(&pool).await.expect("seed catalog");
            let pool = Arc::new(pool);
            let store = PgQuotaStore::new(pool.clone(), Duration::from_millis(200));
            Some((pool, Gate::new(store, GatePolicy::default())))
        }

        async fn user(pool: &PgPool, plan_slug: Option<&str>, used: i64) -> Uuid {
            let user = db::user::insert_user(
                pool,
                db::dtos::user::UserCreateRequest {
                    email: format!("{}@example.com", Uuid::new_v4()),
                    first_name: "Tool".to_string(),
                    last_name: "User".to_string(),
                    password_hash: "x".to_string(),
                },
            )
            .await
            .unwrap();
            db::profile::insert_profile(pool, user.id).await.unwrap();

            if let Some(slug) = plan_slug {
                let plan = db::plan::get_active_plan_by_slug(pool, slug).await.unwrap();
                let now = Utc::now();
                db::subscription::insert_subscription(
                    pool,
                    db::dtos::subscription::SubscriptionCreateRequest {
                        user_id: user.id,
                        plan_id: plan.id,
                        start_date: now - ChronoDuration::days(1),
                        end_date: now + ChronoDuration::days(29),
                    },
                )
                .await
                .unwrap();
            }
            db::profile::set_usage_count(pool, user.id, used).await.unwrap();
            user.id
        }

        fn input() -> Value {
            json!({ "code": "fn main() {}" })
        }

        #[tokio::test]
        async fn unsubscribed_call_writes_nothing() {
            let Some((pool, gate)) = test_gate().await else {
                return;
            };
            let user = user(&pool, None, 0).await;

            let res = process_tool(&pool, &gate, &PlaceholderProcessor, user, TOOL, input()).await;
            assert!(matches!(res, Err(AppError::Forbidden(_))));
            assert_eq!(db::usage::count_user_usages(pool.as_ref(), user).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn last_admitted_call_records_once_then_limit_rejects() {
            let Some((pool, gate)) = test_gate().await else {
                return;
            };
            // free tier allows 100 calls
            let user = user(&pool, Some("free-tier"), 99).await;

            let res = process_tool(&pool, &gate, &PlaceholderProcessor, user, TOOL, input())
                .await
                .unwrap();
            assert_eq!((res.usage, res.limit), (100, 100));
            assert_eq!(db::usage::count_user_usages(pool.as_ref(), user).await.unwrap(), 1);

            let res = process_tool(&pool, &gate, &PlaceholderProcessor, user, TOOL, input()).await;
            assert!(matches!(
                res,
                Err(AppError::QuotaExceeded {
                    limit: 100,
                    usage: 100
                })
            ));
            assert_eq!(db::usage::count_user_usages(pool.as_ref(), user).await.unwrap(), 1);
            let profile = db::profile::get_profile(pool.as_ref(), user).await.unwrap();
            assert_eq!(profile.api_calls_count, 100);
        }

        #[tokio::test]
        async fn failed_run_still_counts_and_records_one_row() {
            let Some((pool, gate)) = test_gate().await else {
                return;
            };
            let user = user(&pool, Some("free-tier"), 0).await;

            let res = process_tool(
                &pool,
                &gate,
                &PlaceholderProcessor,
                user,
                TOOL,
                json!("plain text"),
            )
            .await;
            assert!(matches!(res, Err(AppError::BadRequest(_))));
            assert_eq!(db::usage::count_user_usages(pool.as_ref(), user).await.unwrap(), 1);
            let profile = db::profile::get_profile(pool.as_ref(), user).await.unwrap();
            assert_eq!(profile.api_calls_count, 1);
        }

        #[tokio::test]
        async fn lock_timeout_writes_nothing() {
            let Some((pool, gate)) = test_gate().await else {
                return;
            };
            let user = user(&pool, Some("free-tier"), 0).await;

            let mut holder = gate.store().begin().await.unwrap();
            PgQuotaStore::lock_user(&mut holder, user).await.unwrap();

            let res = process_tool(&pool, &gate, &PlaceholderProcessor, user, TOOL, input()).await;
            assert!(matches!(res, Err(AppError::LockTimeout(_))));
            holder.rollback().await.unwrap();

            assert_eq!(db::usage::count_user_usages(pool.as_ref(), user).await.unwrap(), 0);
            let profile = db::profile::get_profile(pool.as_ref(), user).await.unwrap();
            assert_eq!(profile.api_calls_count, 0);
        }
    }
}
