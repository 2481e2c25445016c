use std::time::Duration;

use chrono::Utc;
use limiter::{rollover::Rollover, store::postgres::PgQuotaStore};

/// Runs the billing-period sweep every `every` on the actix runtime. Paid
/// renewals are invoiced by the store in the same transaction.
pub fn spawn(store: PgQuotaStore, every: Duration) {
    actix_web::rt::spawn(async move {
        let rollover = Rollover::new(store);
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            match rollover.sweep(Utc::now()).await {
                Ok(rolled) if !rolled.is_empty() => {
                    log::info!("Closed {} billing periods", rolled.len())
                }
                Ok(_) => {}
                Err(e) => log::error!("Billing period sweep failed: {}", e),
            }
        }
    });
}
