use std::sync::Arc;

use actix_web::{
    Responder, get, post,
    web::{self},
};
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{dtos::key::CreateKeyRequest, services};

/// Active API keys of the authenticated user. Hashes are never serialized.
#[get("/keys")]
pub async fn get_keys(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let keys = services::key::get_keys(&pool, claims.user_id).await?;
    Success::ok(keys)
}

/// Generates a new API key for the authenticated user.
///
/// # Output
/// - Success: 201 with `{ id, key, name, status, created_at }`
///
/// # Note
/// `key` is only returned here. Store it right away.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/dashboard/key/generate', {
///   method: 'POST',
///   headers: {
///     'Authorization': `Bearer ${localStorage.getItem('authToken')}`,
///     'Content-Type': 'application/json'
///   },
///   body: JSON.stringify({ name: 'ci-runner' })
/// });
/// const { key } = await response.json(); // "sk_..."
/// ```
#[post("/generate")]
pub async fn post_generate_key(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: Option<web::Json<CreateKeyRequest>>,
) -> Res<impl Responder> {
    let req = req.map(web::Json::into_inner).unwrap_or_default();
    let key = services::key::create_key(&pool, claims.user_id, req).await?;
    Success::created(key)
}

/// Revokes one of the user's keys. Keys of other users answer 404.
#[post("/revoke/{id}")]
pub async fn post_revoke(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let key = services::key::revoke_key(&pool, claims.user_id, path.into_inner()).await?;
    Success::ok(key)
}
