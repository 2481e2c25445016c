use db::{
    dtos::user::ProfileUpdateRequest,
    models::{activity::UserActivity, profile::Profile, user::User},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub profile: Profile,
    pub recent_activities: Vec<UserActivity>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub profile: Profile,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub theme_preference: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub notification_preferences: Option<NotificationPreferences>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NotificationPreferences {
    #[serde(default)]
    pub email_updates: bool,
    #[serde(default)]
    pub product_news: bool,
    #[serde(default)]
    pub security_alerts: bool,
    #[serde(default)]
    pub usage_reports: bool,
}

impl From<UpdateProfileRequest> for ProfileUpdateRequest {
    fn from(req: UpdateProfileRequest) -> Self {
        ProfileUpdateRequest {
            first_name: req.first_name,
            last_name: req.last_name,
            theme_preference: req.theme_preference,
            company: req.company,
            job_title: req.job_title,
            phone: req.phone,
            bio: req.bio,
            notification_preferences: req
                .notification_preferences
                .map(|prefs| serde_json::json!(prefs)),
        }
    }
}
