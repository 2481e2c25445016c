use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgSslMode},
};
use std::{str::FromStr, sync::Arc};

pub mod activity;
pub mod invoice;
pub mod key;
pub mod plan;
pub mod profile;
pub mod seed;
pub mod subscription;
pub mod tool;
pub mod usage;
pub mod user;

pub mod models {
    pub mod activity;
    pub mod invoice;
    pub mod key;
    pub mod plan;
    pub mod profile;
    pub mod subscription;
    pub mod tool;
    pub mod usage;
    pub mod user;
}

pub mod dtos {
    pub mod invoice;
    pub mod key;
    pub mod subscription;
    pub mod usage;
    pub mod user;
}

fn connect_options(database_url: &str, require_ssl: bool) -> Result<PgConnectOptions, sqlx::Error> {
    let options = PgConnectOptions::from_str(database_url)?;
    Ok(if require_ssl {
        options.ssl_mode(PgSslMode::Require)
    } else {
        options
    })
}

/// Creates the target database from the `postgres` maintenance database
/// when it does not exist yet.
async fn ensure_database(options: &PgConnectOptions) -> Result<(), sqlx::Error> {
    let Some(db_name) = options.get_database().map(str::to_owned) else {
        return Ok(());
    };

    let admin_pool = PgPool::connect_with(options.clone().database("postgres")).await?;
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&admin_pool)
            .await?;

    if !exists {
        log::info!("Creating database {}", db_name);
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name.replace('"', "\"\"")))
            .execute(&admin_pool)
            .await?;
    }
    admin_pool.close().await;
    Ok(())
}

/// Connects to `database_url`, creating the database if needed, and runs
/// the migrations.
pub async fn setup(
    database_url: &str,
    require_ssl: bool,
) -> Result<Arc<PgPool>, Box<dyn std::error::Error>> {
    let options = connect_options(database_url, require_ssl)?;
    ensure_database(&options).await?;

    let pool = PgPool::connect_with(options).await?;
    migrate(&pool).await?;
    Ok(Arc::new(pool))
}

/// Applies the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
