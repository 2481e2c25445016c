use common::error::{AppError, Res};
use db::dtos::user::{ProfileUpdateRequest, UserCreateRequest};
use db::models::user::User;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dtos::auth::RegisterRequest;
use crate::dtos::user::{MeResponse, ProfileResponse};

const RECENT_ACTIVITIES: i64 = 10;
const THEMES: [&str; 3] = ["system", "light", "dark"];

pub async fn exists_user_by_email(pool: &PgPool, email: &str) -> Res<bool> {
    db::user::exists_user_by_email(pool, email).await
}

/// Inserts the user together with its profile, which holds the usage
/// counter. Both rows are created in one transaction.
pub async fn create_user_with_credentials(pool: &PgPool, req: RegisterRequest) -> Res<User> {
    let password_hash = common::misc::hash_str(&req.password)?;

    let mut tx = pool.begin().await?;
    let user = db::user::insert_user(
        &mut *tx,
        UserCreateRequest {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password_hash,
        },
    )
    .await?;
    db::profile::insert_profile(&mut *tx, user.id).await?;
    let description = format!("Created account for {}", user.full_name());
    db::activity::insert_activity(&mut *tx, user.id, "account_created", &description).await?;
    tx.commit().await?;

    log::info!("Registered user {}", user.id);
    Ok(user)
}

pub async fn get_me(pool: &PgPool, user_id: Uuid) -> Res<MeResponse> {
    let user = db::user::get_user_by_id(pool, user_id).await?;
    let profile = db::profile::get_profile(pool, user_id).await?;
    let recent_activities =
        db::activity::get_recent_activities(pool, user_id, RECENT_ACTIVITIES).await?;
    Ok(MeResponse {
        user,
        profile,
        recent_activities,
    })
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    data: ProfileUpdateRequest,
) -> Res<ProfileResponse> {
    if let Some(theme) = &data.theme_preference {
        if !THEMES.contains(&theme.as_str()) {
            return Err(AppError::BadRequest(format!("Unknown theme '{}'", theme)));
        }
    }

    let mut tx = pool.begin().await?;
    let user = db::user::update_user_names(
        &mut *tx,
        user_id,
        data.first_name.clone(),
        data.last_name.clone(),
    )
    .await?;
    let profile = db::profile::update_profile(&mut *tx, user_id, data).await?;
    db::activity::insert_activity(
        &mut *tx,
        user_id,
        "profile_update",
        "Updated profile information",
    )
    .await?;
    tx.commit().await?;

    Ok(ProfileResponse { user, profile })
}
