use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use common::{error::Res, http::Success, jwt::JwtClaims, key::KeyClaims};
use limiter::PgGate;
use serde_json::Value;
use sqlx::PgPool;

use crate::{
    dtos::tool::ToolListQuery,
    services::{self, processor::PlaceholderProcessor},
};

/// Active tools, twelve per page, optionally filtered by category slug.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/dashboard/tools?category=writing&page=2', {
///   headers: { 'Authorization': `Bearer ${localStorage.getItem('authToken')}` }
/// });
/// const { tools, page, has_next } = await response.json();
/// ```
#[get("")]
pub async fn get_tools(
    pool: web::Data<Arc<PgPool>>,
    query: web::Query<ToolListQuery>,
) -> Res<impl Responder> {
    let ToolListQuery { category, page } = query.into_inner();
    let tools = services::tool::list_tools(&pool, category, page).await?;
    Success::ok(tools)
}

/// One tool with the caller's five most recent runs of it.
#[get("/{slug}")]
pub async fn get_tool(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<String>,
) -> Res<impl Responder> {
    let tool = services::tool::get_tool(&pool, claims.user_id, &path).await?;
    Success::ok(tool)
}

/// Runs a tool as a dashboard user. Counts against the plan's call limit.
///
/// # Output
/// - Success: `{ output, tokens_used, cost_micros, usage, limit }`
/// - Error: 403 without an active subscription, 429 once the limit is
///   reached, 503 if the quota lock is busy, 400 if the tool run fails
#[post("/{slug}/process")]
pub async fn post_process(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    gate: web::Data<PgGate>,
    path: web::Path<String>,
    input: web::Json<Value>,
) -> Res<impl Responder> {
    let res = services::tool::process_tool(
        &pool,
        gate.get_ref(),
        &PlaceholderProcessor,
        claims.user_id,
        &path,
        input.into_inner(),
    )
    .await?;
    Success::ok(res)
}

/// Same as the dashboard route, authenticated with an `X-API-KEY` header.
///
/// # Example
/// ```bash
/// curl -X POST https://yourapp.com/api/v1/tools/story-writer-pro/process \
///   -H "X-API-KEY: sk_..." -H "Content-Type: application/json" \
///   -d '{"prompt": "a lighthouse keeper"}'
/// ```
#[post("/{slug}/process")]
pub async fn post_process_with_key(
    claims: web::ReqData<KeyClaims>,
    pool: web::Data<Arc<PgPool>>,
    gate: web::Data<PgGate>,
    path: web::Path<String>,
    input: web::Json<Value>,
) -> Res<impl Responder> {
    let res = services::tool::process_tool(
        &pool,
        gate.get_ref(),
        &PlaceholderProcessor,
        claims.user_id,
        &path,
        input.into_inner(),
    )
    .await?;
    Success::ok(res)
}
