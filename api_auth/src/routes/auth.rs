use actix_web::{Responder, post, web};
use common::env_config::Config;
use common::error::{AppError, Res};
use common::http::Success;
use sqlx::PgPool;
use std::sync::Arc;

use crate::dtos::auth::{LoginRequest, RegisterRequest};
use crate::services;

/// Registers a new user with email and password authentication.
///
/// # Input
/// - `req`: JSON payload with email, password, first and last name
///
/// # Output
/// - Success: the created user and a JWT, with 201 Created status
/// - Error: 400 Bad Request if the email is taken or the input is invalid
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/auth/register', {
///   method: 'POST',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({
///     email: 'user@example.com',
///     password: 'securepassword',
///     first_name: 'John',
///     last_name: 'Doe'
///   })
/// });
/// ```
#[post("/register")]
async fn post_register(
    req: web::Json<RegisterRequest>,
    pool: web::Data<Arc<PgPool>>,
    config: web::Data<Arc<Config>>,
) -> Res<impl Responder> {
    let pg_pool: &PgPool = &pool;
    let req = req.into_inner().validated()?;
    if services::user::exists_user_by_email(pg_pool, &req.email).await? {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }
    let user = services::user::create_user_with_credentials(pg_pool, req).await?;
    let auth = services::auth::issue_token(user, &config.jwt_config)?;
    Success::created(auth)
}

/// Authenticates a user with email and password.
///
/// # Output
/// - Success: `{ token, user }`
/// - Error: 401 Unauthorized for invalid credentials
#[post("/login")]
pub async fn post_login(
    login_data: web::Json<LoginRequest>,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let pg_pool: &PgPool = &pool;
    let user = services::auth::authenticate_user(pg_pool, &login_data).await?;
    let auth = services::auth::issue_token(user, &config.jwt_config)?;
    Success::ok(auth)
}
