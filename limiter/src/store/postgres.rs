use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::{
    dtos::invoice::InvoiceCreateRequest,
    models::{
        invoice::{Invoice, InvoiceStatus},
        subscription::{SubscriptionDetails, SubscriptionStatus},
    },
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{PeriodClose, QuotaStore};
use crate::gate::{BillingPeriod, Decision, QuotaSnapshot, SubscriptionTerms};

/// Postgres `lock_not_available`, raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Quota store backed by the `profiles` table. The user's profile row is the
/// lock: it is selected `FOR UPDATE` for the length of each transaction.
#[derive(Clone)]
pub struct PgQuotaStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PgQuotaStore {
    pub fn new(pool: Arc<PgPool>, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens a transaction whose row-lock waits give up after `lock_timeout`.
    pub async fn begin(&self) -> Res<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis().max(1)
        ))
        .execute(&mut *tx)
        .await?;
        Ok(tx)
    }

    /// Takes the user's row lock. `None` when the user has no profile.
    pub async fn lock_user(
        tx: &mut Transaction<'static, Postgres>,
        user_id: Uuid,
    ) -> Res<Option<i64>> {
        db::profile::lock_usage_count(&mut **tx, user_id)
            .await
            .map_err(|e| lock_error(e, user_id))
    }

    async fn locked_details(
        tx: &mut Transaction<'static, Postgres>,
        user_id: Uuid,
    ) -> Res<Option<(i64, Option<SubscriptionDetails>)>> {
        let Some(count) = Self::lock_user(tx, user_id).await? else {
            return Ok(None);
        };
        let details = db::subscription::get_subscription_details(&mut **tx, user_id).await?;
        Ok(Some((count, details)))
    }

    async fn locked_terms(
        tx: &mut Transaction<'static, Postgres>,
        user_id: Uuid,
    ) -> Res<Option<(i64, Option<SubscriptionTerms>)>> {
        Ok(Self::locked_details(tx, user_id)
            .await?
            .map(|(count, details)| (count, details.as_ref().map(SubscriptionTerms::from))))
    }
}

/// Bills the renewed period of a paid plan as an open invoice due when the
/// period starts. Runs in the rollover transaction, so a period is never
/// renewed without its invoice.
async fn bill_renewal(
    tx: &mut Transaction<'static, Postgres>,
    details: &SubscriptionDetails,
    period: BillingPeriod,
) -> Res<Option<Invoice>> {
    if details.plan_price_cents == 0 {
        return Ok(None);
    }
    let invoice = db::invoice::insert_invoice(
        &mut **tx,
        InvoiceCreateRequest {
            user_id: details.subscription.user_id,
            subscription_id: Some(details.subscription.id),
            amount_cents: details.plan_price_cents,
            currency: details.plan_currency.clone(),
            status: InvoiceStatus::Open,
            due_date: period.start.date_naive(),
        },
    )
    .await?;
    log::info!(
        "Issued renewal invoice {} for user {}",
        invoice.display_number(),
        details.subscription.user_id
    );
    Ok(Some(invoice))
}

fn lock_error(error: AppError, user_id: Uuid) -> AppError {
    let timed_out = matches!(
        &error,
        AppError::Database(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
    );
    if timed_out {
        AppError::LockTimeout(format!("Quota lock for user {} not acquired in time", user_id))
    } else {
        error
    }
}

impl QuotaStore for PgQuotaStore {
    async fn admit_with<F>(&self, user_id: Uuid, decide: F) -> Res<Decision>
    where
        F: FnOnce(&QuotaSnapshot) -> Decision + Send,
    {
        let mut tx = self.begin().await?;
        let snapshot = match Self::locked_terms(&mut tx, user_id).await? {
            Some((usage_count, subscription)) => QuotaSnapshot {
                usage_count,
                subscription,
            },
            None => QuotaSnapshot::default(),
        };

        let decision = decide(&snapshot);
        if let Decision::Admit { usage, .. } = decision {
            db::profile::set_usage_count(&mut *tx, user_id, usage).await?;
            tx.commit().await?;
        }
        Ok(decision)
    }

    async fn roll_period(&self, user_id: Uuid, period: BillingPeriod) -> Res<bool> {
        let mut tx = self.begin().await?;
        let Some((_, Some(terms))) = Self::locked_terms(&mut tx, user_id).await? else {
            return Ok(false);
        };

        let changed = terms.period.end != period.end;
        db::subscription::update_period(&mut *tx, user_id, period.start, period.end).await?;
        if changed {
            db::profile::set_usage_count(&mut *tx, user_id, 0).await?;
        }
        tx.commit().await?;
        Ok(changed)
    }

    async fn reset_usage(&self, user_id: Uuid) -> Res<()> {
        let mut tx = self.begin().await?;
        if Self::lock_user(&mut tx, user_id).await?.is_some() {
            db::profile::set_usage_count(&mut *tx, user_id, 0).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn due_for_rollover(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>> {
        db::subscription::get_users_due_for_rollover(self.pool(), now).await
    }

    async fn close_period_with<F>(&self, user_id: Uuid, decide: F) -> Res<Option<PeriodClose>>
    where
        F: FnOnce(&SubscriptionTerms) -> Option<PeriodClose> + Send,
    {
        let mut tx = self.begin().await?;
        let Some((_, Some(details))) = Self::locked_details(&mut tx, user_id).await? else {
            return Ok(None);
        };
        let Some(close) = decide(&SubscriptionTerms::from(&details)) else {
            return Ok(None);
        };

        match close {
            PeriodClose::Renewed(period) => {
                db::subscription::update_period(&mut *tx, user_id, period.start, period.end)
                    .await?;
                db::profile::set_usage_count(&mut *tx, user_id, 0).await?;
                bill_renewal(&mut tx, &details, period).await?;
            }
            PeriodClose::Cancelled => {
                db::subscription::update_status(
                    &mut *tx,
                    details.subscription.id,
                    SubscriptionStatus::Cancelled,
                )
                .await?;
            }
        }
        tx.commit().await?;
        Ok(Some(close))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        gate::{Gate, GatePolicy, Rejection},
        rollover::Rollover,
    };

    /// Connects to `TEST_DATABASE_URL` when it is set; these tests are
    /// skipped otherwise.
    async fn test_pool() -> Option<Arc<PgPool>> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.expect("connect to test database");
        db::migrate(&pool).await.expect("migrate test database");
        Some(Arc::new(pool))
    }

    async fn user_with_plan(pool: &PgPool, limit: i64, now: DateTime<Utc>) -> Uuid {
        let period = BillingPeriod::new(
            now - ChronoDuration::days(1),
            now + ChronoDuration::days(29),
        );
        user_on_plan(pool, limit, 0, period).await
    }

    async fn user_on_plan(
        pool: &PgPool,
        limit: i64,
        price_cents: i64,
        period: BillingPeriod,
    ) -> Uuid {
        let mut tx = pool.begin().await.unwrap();
        let user = db::user::insert_user(
            &mut *tx,
            db::dtos::user::UserCreateRequest {
                email: format!("{}@example.com", Uuid::new_v4()),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                password_hash: "x".to_string(),
            },
        )
        .await
        .unwrap();
        db::profile::insert_profile(&mut *tx, user.id).await.unwrap();

        let plan_id: Uuid = sqlx::query_scalar(
            "INSERT INTO plans (slug, name, price_cents, api_calls_limit) \
             VALUES ($1, 'Test', $2, $3) RETURNING id",
        )
        .bind(format!("test-{}", Uuid::new_v4()))
        .bind(price_cents)
        .bind(limit)
        .fetch_one(&mut *tx)
        .await
        .unwrap();

        db::subscription::insert_subscription(
            &mut *tx,
            db::dtos::subscription::SubscriptionCreateRequest {
                user_id: user.id,
                plan_id,
                start_date: period.start,
                end_date: period.end,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        user.id
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn row_lock_serializes_concurrent_admits() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let now = Utc::now();
        let user = user_with_plan(&pool, 10, now).await;
        let gate = Arc::new(Gate::new(
            PgQuotaStore::new(pool.clone(), Duration::from_secs(10)),
            GatePolicy::default(),
        ));

        let handles: Vec<_> = (0..30)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.authorize(user, now).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Decision::Admit { .. } => admitted += 1,
                Decision::Reject(Rejection::LimitExceeded { .. }) => {}
                other => panic!("unexpected decision {:?}", other),
            }
        }
        assert_eq!(admitted, 10);

        let profile = db::profile::get_profile(pool.as_ref(), user).await.unwrap();
        assert_eq!(profile.api_calls_count, 10);
    }

    #[tokio::test]
    async fn held_row_lock_reports_timeout() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let now = Utc::now();
        let user = user_with_plan(&pool, 10, now).await;
        let store = PgQuotaStore::new(pool.clone(), Duration::from_millis(100));

        let mut holder = store.begin().await.unwrap();
        PgQuotaStore::lock_user(&mut holder, user).await.unwrap();

        let res = Gate::new(store.clone(), GatePolicy::default())
            .authorize(user, now)
            .await;
        assert!(matches!(res, Err(AppError::LockTimeout(_))));
        holder.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn renewal_resets_usage_and_bills_once() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let now = Utc::now();
        let ended = BillingPeriod::new(
            now - ChronoDuration::days(31),
            now - ChronoDuration::days(1),
        );
        let user = user_on_plan(&pool, 100, 1900, ended).await;
        db::profile::set_usage_count(pool.as_ref(), user, 7).await.unwrap();

        let rollover = Rollover::new(PgQuotaStore::new(pool.clone(), Duration::from_secs(5)));
        let rolled = rollover.sweep(now).await.unwrap();
        assert!(rolled.iter().any(|r| r.user_id == user));

        let profile = db::profile::get_profile(pool.as_ref(), user).await.unwrap();
        assert_eq!(profile.api_calls_count, 0);
        let invoices = db::invoice::get_recent_invoices(pool.as_ref(), user, 10)
            .await
            .unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].amount_cents, 1900);
        assert_eq!(invoices[0].status, InvoiceStatus::Open);

        let rolled = rollover.sweep(now).await.unwrap();
        assert!(rolled.iter().all(|r| r.user_id != user));
        let invoices = db::invoice::get_recent_invoices(pool.as_ref(), user, 10)
            .await
            .unwrap();
        assert_eq!(invoices.len(), 1);
    }

    #[tokio::test]
    async fn free_renewal_issues_no_invoice() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let now = Utc::now();
        let ended = BillingPeriod::new(
            now - ChronoDuration::days(31),
            now - ChronoDuration::days(1),
        );
        let user = user_on_plan(&pool, 100, 0, ended).await;
        db::profile::set_usage_count(pool.as_ref(), user, 4).await.unwrap();

        let store = PgQuotaStore::new(pool.clone(), Duration::from_secs(5));
        let close = store
            .close_period_with(user, |terms| crate::rollover::plan_close(terms, now))
            .await
            .unwrap();
        assert!(matches!(close, Some(PeriodClose::Renewed(_))));

        let profile = db::profile::get_profile(pool.as_ref(), user).await.unwrap();
        assert_eq!(profile.api_calls_count, 0);
        let invoices = db::invoice::get_recent_invoices(pool.as_ref(), user, 10)
            .await
            .unwrap();
        assert!(invoices.is_empty());
    }
}
