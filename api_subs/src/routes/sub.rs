use actix_web::{Responder, get, post, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use limiter::PgGate;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{dtos::sub::PlansResponse, services};

/// Lists the active pricing plans, cheapest first. Public.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/plans');
/// const { plans } = await response.json();
/// // plans[0] = { slug: "free-tier", price_cents: 0, api_calls_limit: 100, ... }
/// ```
#[get("")]
pub async fn get_plans(pool: web::Data<Arc<PgPool>>) -> Res<impl Responder> {
    let plans = services::sub::get_plans(&pool).await?;
    Success::ok(PlansResponse { plans })
}

/// Current subscription with plan details, the usage of the running
/// billing period and the last twelve invoices.
#[get("/current")]
pub async fn get_current(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let current = services::sub::get_current(&pool, claims.user_id).await?;
    Success::ok(current)
}

/// Subscribes to the plan identified by `slug`, or switches to it.
///
/// # Output
/// - Success: `{ message, subscription, invoice }`; `invoice` is set for paid plans
/// - Error: 400 if already subscribed to this plan, 404 for unknown plans
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/dashboard/sub/change/basic-plan', {
///   method: 'POST',
///   headers: { 'Authorization': `Bearer ${localStorage.getItem('authToken')}` }
/// });
/// ```
#[post("/change/{slug}")]
pub async fn post_change(
    claims: web::ReqData<JwtClaims>,
    gate: web::Data<PgGate>,
    path: web::Path<String>,
) -> Res<impl Responder> {
    let res =
        services::sub::change_plan(gate.store(), claims.user_id, &path, Utc::now()).await?;
    Success::ok(res)
}

/// Schedules the active subscription to end with the current period.
#[post("/cancel")]
pub async fn post_cancel(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let subscription =
        services::sub::set_cancel_at_period_end(&pool, claims.user_id, true).await?;
    Success::ok(subscription)
}

/// Undoes a scheduled cancellation.
#[post("/reactivate")]
pub async fn post_reactivate(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let subscription =
        services::sub::set_cancel_at_period_end(&pool, claims.user_id, false).await?;
    Success::ok(subscription)
}
