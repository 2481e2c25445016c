use std::sync::Arc;

use actix_web::{
    Responder, get,
    web::{self},
};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;

use crate::services;

/// Usage of the last thirty days: totals, daily averages, the five most
/// used tools and the ten latest records.
#[get("/usage")]
pub async fn get_usage(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let report = services::usage::get_report(&pool, claims.user_id, Utc::now()).await?;
    Success::ok(report)
}

/// Monthly usage of the last year and all-time totals per tool.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/dashboard/key/usage/stats', {
///   headers: { 'Authorization': `Bearer ${localStorage.getItem('authToken')}` }
/// });
/// const { monthly, tools } = await response.json();
/// ```
#[get("/usage/stats")]
pub async fn get_usage_statistics(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let stats = services::usage::get_statistics(&pool, claims.user_id, Utc::now()).await?;
    Success::ok(stats)
}
