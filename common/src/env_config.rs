use std::{env, str::FromStr, sync::Arc, time::Duration};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds all the necessary configuration parameters
/// required to initialize and run the server.
/// It includes database connection details, JWT configuration,
/// server host and port, number of worker threads, CORS settings,
/// logging preferences, payment gateway secrets and the knobs of the
/// usage quota gate and its billing-period rollover job.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// File the logger mirrors its output to.
    pub log_file: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    /// Requests per second admitted by the global throttle.
    pub global_rate_limit: u32,
    /// Quota gate settings.
    pub quota: QuotaConfig,
    /// Seconds between two billing-period rollover sweeps.
    pub rollover_interval_secs: u64,
    /// Insert sample plans and tools at startup.
    pub seed_sample_data: bool,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// This struct contains the secret key used to sign JWTs and
/// the expiration time in hours for issued tokens.
pub struct JwtConfig {
    /// The secret key used to sign and verify JWTs.
    pub secret: String,
    /// The expiration time for JWTs in hours.
    pub expiration_hours: i64,
}

#[derive(Clone, Debug)]
pub struct QuotaConfig {
    /// Upper bound on waiting for a user's quota lock.
    pub lock_timeout: Duration,
    /// Reject metered calls while a subscription is scheduled for cancellation.
    pub deny_pending_cancellation: bool,
}

impl JwtConfig {
    /// Creates a new `JwtConfig` instance from environment variables.
    ///
    /// Reads the JWT configuration from environment variables:
    /// - `JWT_SECRET`: Required. The secret key for JWT signing.
    /// - `JWT_EXPIRATION_HOURS`: Optional. Defaults to 24 hours if not provided.
    ///
    /// # Panics
    ///
    /// This function will panic if:
    /// - `JWT_SECRET` environment variable is not set
    /// - `JWT_EXPIRATION_HOURS` is set but cannot be parsed as a valid number
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        JwtConfig {
            secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a valid number"),
        }
    }
}

impl QuotaConfig {
    /// Reads `QUOTA_LOCK_TIMEOUT_MS` (default 2000) and
    /// `DENY_PENDING_CANCELLATION` (default true).
    pub fn from_env() -> Self {
        QuotaConfig {
            lock_timeout: Duration::from_millis(
                env::var("QUOTA_LOCK_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2000),
            ),
            deny_pending_cancellation: env_flag("DENY_PENDING_CANCELLATION", true),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        QuotaConfig {
            lock_timeout: Duration::from_millis(2000),
            deny_pending_cancellation: true,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// Loads all configuration values from environment variables with sensible defaults
    /// for most optional settings.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: `development` or `production`
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT signing (via `JwtConfig::from_env()`)
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `LOG_FILE`: Log file path (default: "meterd.log")
    /// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: payment gateway secrets (default: empty)
    /// - `GLOBAL_RATE_LIMIT`: Requests per second across the server (default: 100)
    /// - `QUOTA_LOCK_TIMEOUT_MS`, `DENY_PENDING_CANCELLATION`: see `QuotaConfig`
    /// - `ROLLOVER_INTERVAL_SECS`: Rollover sweep period (default: 3600)
    /// - `SEED_SAMPLE_DATA`: Seed plans and tools at startup (default: false)
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_config: JwtConfig::from_env(),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            num_workers: env::var("WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env_flag("ENABLE_CONSOLE_LOGGING", true),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "meterd.log".to_string()),
            stripe_secret_key,
            stripe_webhook_secret,
            global_rate_limit: positive_or(env::var("GLOBAL_RATE_LIMIT").ok(), 100),
            quota: QuotaConfig::from_env(),
            rollover_interval_secs: positive_or(env::var("ROLLOVER_INTERVAL_SECS").ok(), 3600),
            seed_sample_data: env_flag("SEED_SAMPLE_DATA", false),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

/// Parses a strictly positive number, falling back to `default` when the
/// value is missing, malformed or zero.
fn positive_or<T: FromStr + PartialOrd + Default>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_falls_back_to_default() {
        assert_eq!(positive_or::<u64>(Some("0".to_string()), 3600), 3600);
        assert_eq!(positive_or::<u64>(Some("90".to_string()), 3600), 90);
    }

    #[test]
    fn malformed_or_missing_values_use_default() {
        assert_eq!(positive_or::<u32>(Some("fast".to_string()), 100), 100);
        assert_eq!(positive_or::<u32>(Some("-5".to_string()), 100), 100);
        assert_eq!(positive_or::<u32>(None, 100), 100);
    }
}
