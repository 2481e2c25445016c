use actix_web::HttpResponse;
use thiserror::Error;

pub type Res<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    JWT(#[from] jsonwebtoken::errors::Error),

    #[error("Stripe error: {0}")]
    Stripe(#[from] stripe::StripeError),

    // === APPLICATION ERRORS ===
    #[error("Authorization error: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),

    #[error("You have reached your API calls limit for this billing period ({usage}/{limit})")]
    QuotaExceeded { limit: i64, usage: i64 },

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn to_http_response(&self) -> HttpResponse {
        let is_dev = cfg!(debug_assertions);

        let to_internal_json = |err_msg: &str| {
            if is_dev {
                serde_json::json!({ "error": err_msg })
            } else {
                serde_json::json!({ "error": "Internal server error" })
            }
        };

        match self {
            // === CONVERSION ERRORS ===
            AppError::Database(error) => {
                log::error!("Database error: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(&error.to_string()))
            }
            AppError::JWT(error) => {
                log::warn!("JWT error: {}", error);
                HttpResponse::Unauthorized().json(serde_json::json!({ "error": "Invalid token" }))
            }
            AppError::Stripe(error) => {
                log::error!("Stripe error: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(&error.to_string()))
            }

            // === APPLICATION ERRORS ===
            AppError::Unauthorized(_) => {
                HttpResponse::Unauthorized().json(serde_json::json!({ "error": self.to_string() }))
            }
            AppError::Forbidden(_) => {
                HttpResponse::Forbidden().json(serde_json::json!({ "error": self.to_string() }))
            }
            AppError::NotFound(_) => {
                HttpResponse::NotFound().json(serde_json::json!({ "error": self.to_string() }))
            }
            AppError::BadRequest(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": self.to_string() }))
            }
            AppError::TooManyRequests(_) => HttpResponse::TooManyRequests()
                .json(serde_json::json!({ "error": self.to_string() })),
            AppError::QuotaExceeded { limit, usage } => {
                HttpResponse::TooManyRequests().json(serde_json::json!({
                    "error": "You have reached your API calls limit for this billing period.",
                    "limit": limit,
                    "usage": usage,
                }))
            }
            AppError::LockTimeout(error) => {
                log::warn!("Lock timeout: {}", error);
                HttpResponse::ServiceUnavailable()
                    .insert_header(("Retry-After", "1"))
                    .json(serde_json::json!({
                        "error": "Request could not be processed in time, please retry"
                    }))
            }

            AppError::Internal(error) => {
                log::error!("Internal error: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(&error.to_string()))
            }
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.to_http_response()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{body, http::StatusCode};
    use serde_json::Value;

    use super::*;

    async fn body_json(res: HttpResponse) -> Value {
        let bytes = body::to_bytes(res.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn quota_exceeded_reports_limit_and_usage() {
        let res = AppError::QuotaExceeded { limit: 5, usage: 5 }.to_http_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let json = body_json(res).await;
        assert_eq!(json["limit"], 5);
        assert_eq!(json["usage"], 5);
    }

    #[actix_web::test]
    async fn lock_timeout_is_retryable_unavailable() {
        let res = AppError::LockTimeout("user row busy".to_string()).to_http_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.headers().get("Retry-After").unwrap(), "1");
    }

    #[actix_web::test]
    async fn forbidden_keeps_message() {
        let res =
            AppError::Forbidden("No active subscription found".to_string()).to_http_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let json = body_json(res).await;
        assert_eq!(json["error"], "Forbidden: No active subscription found");
    }
}
