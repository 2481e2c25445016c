mod cors;
mod rollover;

use std::time::Duration;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::env_config::Config;
use limiter::{
    gate::{Gate, GatePolicy},
    store::postgres::PgQuotaStore,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    let is_production = config.environment == "production";
    let origin = config.cors_allowed_origin.clone();

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_file).expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    if config.seed_sample_data {
        db::seed::sample_catalog(&pool)
            .await
            .expect("Failed to insert sample data");
    }

    // quota gate, shared by every worker so they all take the same locks
    let store = PgQuotaStore::new(pool.clone(), config.quota.lock_timeout);
    let gate = web::Data::new(Gate::new(store.clone(), GatePolicy::from(&config.quota)));

    rollover::spawn(store, Duration::from_secs(config.rollover_interval_secs));

    // one throttle for the whole server, cloned into each worker
    let throttle = limiter::global_middleware(config.global_rate_limit);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .app_data(gate.clone())
            .wrap(throttle.clone()) // 4th
            .wrap(logger::middleware()) // 3rd
            .wrap(extractor::middleware()) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(api_auth::mount_auth())
                    .service(api_subs::mount_plans())
                    .service(api_subs::mount_webhook())
                    .service(
                        web::scope("/dashboard")
                            .wrap(api_auth::auth_middleware())
                            .service(api_auth::mount_user())
                            .service(api_subs::mount_pay())
                            .service(api_subs::mount_subs())
                            .service(api_keys::mount_keys())
                            .service(api_tools::mount_tools()),
                    )
                    .service(
                        web::scope("/v1")
                            .wrap(api_keys::middleware())
                            .service(api_tools::mount_v1_tools()),
                    ),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
