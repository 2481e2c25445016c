use std::sync::Arc;

use actix_web::{Responder, get, put, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;

use crate::{dtos::user::UpdateProfileRequest, services};

/// Endpoint to retrieve the current authenticated user's information.
///
/// Returns the user, the profile (including `api_calls_count`, the usage of
/// the current billing period) and the ten most recent activities.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/dashboard/user/me', {
///   headers: {
///     'Authorization': `Bearer ${localStorage.getItem('authToken')}`
///   }
/// });
/// ```
#[get("/me")]
async fn get_me(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let me = services::user::get_me(&pool, claims.user_id).await?;
    Success::ok(me)
}

/// Updates names and profile fields. Omitted fields are left unchanged.
#[put("/profile")]
async fn put_profile(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<UpdateProfileRequest>,
) -> Res<impl Responder> {
    let updated =
        services::user::update_profile(&pool, claims.user_id, req.into_inner().into()).await?;
    Success::ok(updated)
}
