use common::{
    env_config::JwtConfig,
    error::{AppError, Res},
    jwt::{self, ClaimsSpec},
    misc,
};
use db::models::user::User;
use sqlx::PgPool;

use crate::dtos::auth::{AuthResponse, LoginRequest};

/// Checks the credentials and returns the user they belong to.
/// Unknown emails and wrong passwords are indistinguishable to the caller.
pub async fn authenticate_user(pool: &PgPool, req: &LoginRequest) -> Res<User> {
    let email = req.email.trim().to_lowercase();
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let record = db::user::get_user_with_password_hash(pool, &email)
        .await?
        .ok_or_else(invalid)?;

    if !misc::verify_hash(&req.password, &record.password_hash) {
        log::info!("Failed login attempt for {}", email);
        return Err(invalid());
    }
    Ok(record.user)
}

pub fn issue_token(user: User, config: &JwtConfig) -> Res<AuthResponse> {
    let token = jwt::generate_jwt(
        ClaimsSpec {
            user_id: user.id,
            email: user.email.clone(),
        },
        config,
    )?;
    Ok(AuthResponse { token, user })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn issued_token_belongs_to_the_user() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let config = JwtConfig {
            secret: "secret".to_string(),
            expiration_hours: 1,
        };

        let res = issue_token(user.clone(), &config).unwrap();
        let claims = jwt::validate_jwt(&res.token, "secret").unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.email, user.email);
    }
}
