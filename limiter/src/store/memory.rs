use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use dashmap::DashMap;
use db::models::subscription::SubscriptionStatus;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{PeriodClose, QuotaStore};
use crate::gate::{BillingPeriod, Decision, QuotaSnapshot, SubscriptionTerms};

#[derive(Debug, Default)]
struct Account {
    terms: Option<SubscriptionTerms>,
    usage_count: i64,
}

/// In-process quota store: one async mutex per user.
#[derive(Clone)]
pub struct MemoryQuotaStore {
    accounts: Arc<DashMap<Uuid, Arc<Mutex<Account>>>>,
    lock_timeout: Duration,
}

impl MemoryQuotaStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: Arc::new(DashMap::new()),
            lock_timeout,
        }
    }

    /// Creates the user's counter at zero if it does not exist yet.
    pub fn open_account(&self, user_id: Uuid) {
        self.accounts.entry(user_id).or_default();
    }

    /// Starts a new subscription for the user, resetting the count.
    pub async fn subscribe(&self, user_id: Uuid, terms: SubscriptionTerms) -> Res<()> {
        self.open_account(user_id);
        let mut account = self.lock_existing(user_id).await?;
        account.terms = Some(terms);
        account.usage_count = 0;
        Ok(())
    }

    pub async fn set_cancel_at_period_end(&self, user_id: Uuid, cancel: bool) -> Res<bool> {
        let Some(mut account) = self.lock(user_id).await? else {
            return Ok(false);
        };
        match account.terms.as_mut() {
            Some(terms) if terms.status == SubscriptionStatus::Active => {
                terms.cancel_at_period_end = cancel;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn set_usage(&self, user_id: Uuid, count: i64) -> Res<()> {
        if count < 0 {
            return Err(AppError::BadRequest("Usage count cannot be negative".to_string()));
        }
        self.open_account(user_id);
        self.lock_existing(user_id).await?.usage_count = count;
        Ok(())
    }

    pub async fn usage(&self, user_id: Uuid) -> Res<Option<i64>> {
        Ok(self.lock(user_id).await?.map(|account| account.usage_count))
    }

    pub async fn terms(&self, user_id: Uuid) -> Res<Option<SubscriptionTerms>> {
        Ok(self.lock(user_id).await?.and_then(|account| account.terms.clone()))
    }

    // The map guard is released before any await.
    fn account(&self, user_id: Uuid) -> Option<Arc<Mutex<Account>>> {
        self.accounts.get(&user_id).map(|entry| entry.value().clone())
    }

    async fn acquire(
        &self,
        user_id: Uuid,
        account: Arc<Mutex<Account>>,
    ) -> Res<OwnedMutexGuard<Account>> {
        tokio::time::timeout(self.lock_timeout, account.lock_owned())
            .await
            .map_err(|_| {
                AppError::LockTimeout(format!(
                    "Quota lock for user {} not acquired in time",
                    user_id
                ))
            })
    }

    async fn lock(&self, user_id: Uuid) -> Res<Option<OwnedMutexGuard<Account>>> {
        match self.account(user_id) {
            Some(account) => self.acquire(user_id, account).await.map(Some),
            None => Ok(None),
        }
    }

    async fn lock_existing(&self, user_id: Uuid) -> Res<OwnedMutexGuard<Account>> {
        self.lock(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No quota account for user {}", user_id)))
    }
}

impl QuotaStore for MemoryQuotaStore {
    async fn admit_with<F>(&self, user_id: Uuid, decide: F) -> Res<Decision>
    where
        F: FnOnce(&QuotaSnapshot) -> Decision + Send,
    {
        let Some(mut account) = self.lock(user_id).await? else {
            return Ok(decide(&QuotaSnapshot::default()));
        };

        let snapshot = QuotaSnapshot {
            usage_count: account.usage_count,
            subscription: account.terms.clone(),
        };
        let decision = decide(&snapshot);
        if let Decision::Admit { usage, .. } = decision {
            account.usage_count = usage;
        }
        Ok(decision)
    }

    async fn roll_period(&self, user_id: Uuid, period: BillingPeriod) -> Res<bool> {
        let Some(mut account) = self.lock(user_id).await? else {
            return Ok(false);
        };
        let Some(terms) = account.terms.as_mut() else {
            return Ok(false);
        };

        let changed = terms.period.end != period.end;
        terms.period = period;
        if changed {
            account.usage_count = 0;
        }
        Ok(changed)
    }

    async fn reset_usage(&self, user_id: Uuid) -> Res<()> {
        if let Some(mut account) = self.lock(user_id).await? {
            account.usage_count = 0;
        }
        Ok(())
    }

    async fn due_for_rollover(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>> {
        let accounts: Vec<_> = self
            .accounts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        // A busy account is reported as due; `close_period_with` re-checks
        // it under its own lock and the sweep skips it if still busy.
        let mut due = Vec::new();
        for (user_id, account) in accounts {
            let account = match self.acquire(user_id, account).await {
                Ok(account) => account,
                Err(AppError::LockTimeout(_)) => {
                    due.push(user_id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(terms) = &account.terms {
                if terms.status == SubscriptionStatus::Active && terms.period.end < now {
                    due.push(user_id);
                }
            }
        }
        Ok(due)
    }

    async fn close_period_with<F>(&self, user_id: Uuid, decide: F) -> Res<Option<PeriodClose>>
    where
        F: FnOnce(&SubscriptionTerms) -> Option<PeriodClose> + Send,
    {
        let Some(mut account) = self.lock(user_id).await? else {
            return Ok(None);
        };
        let Some(close) = account.terms.as_ref().and_then(decide) else {
            return Ok(None);
        };

        match close {
            PeriodClose::Renewed(period) => {
                if let Some(terms) = account.terms.as_mut() {
                    terms.period = period;
                }
                account.usage_count = 0;
            }
            PeriodClose::Cancelled => {
                if let Some(terms) = account.terms.as_mut() {
                    terms.status = SubscriptionStatus::Cancelled;
                }
            }
        }
        Ok(Some(close))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    fn terms(now: DateTime<Utc>) -> SubscriptionTerms {
        SubscriptionTerms {
            status: SubscriptionStatus::Active,
            period: BillingPeriod::new(
                now - ChronoDuration::days(10),
                now + ChronoDuration::days(20),
            ),
            cancel_at_period_end: false,
            api_calls_limit: 3,
        }
    }

    #[tokio::test]
    async fn busy_lock_times_out() {
        let store = MemoryQuotaStore::new(Duration::from_millis(50));
        let user = Uuid::new_v4();
        store.subscribe(user, terms(Utc::now())).await.unwrap();

        let _held = store.lock_existing(user).await.unwrap();
        let res = store
            .admit_with(user, |_| Decision::Admit { usage: 1, limit: 3 })
            .await;
        assert!(matches!(res, Err(AppError::LockTimeout(_))));
    }

    #[tokio::test]
    async fn other_users_are_not_blocked() {
        let store = MemoryQuotaStore::new(Duration::from_millis(50));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.subscribe(a, terms(Utc::now())).await.unwrap();
        store.subscribe(b, terms(Utc::now())).await.unwrap();

        let _held = store.lock_existing(a).await.unwrap();
        let decision = store
            .admit_with(b, |s| Decision::Admit { usage: s.usage_count + 1, limit: 3 })
            .await
            .unwrap();
        assert!(decision.is_admitted());
    }

    #[tokio::test]
    async fn same_period_end_keeps_usage() {
        let now = Utc::now();
        let store = MemoryQuotaStore::new(Duration::from_secs(1));
        let user = Uuid::new_v4();
        let t = terms(now);
        store.subscribe(user, t.clone()).await.unwrap();
        store.set_usage(user, 2).await.unwrap();

        let same_end = BillingPeriod::new(now, t.period.end);
        assert!(!store.roll_period(user, same_end).await.unwrap());
        assert_eq!(store.usage(user).await.unwrap(), Some(2));
        assert_eq!(store.terms(user).await.unwrap().unwrap().period, same_end);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn busy_user_does_not_stall_the_sweep() {
        let now = Utc::now();
        let store = MemoryQuotaStore::new(Duration::from_millis(50));
        let ended = BillingPeriod::new(
            now - ChronoDuration::days(40),
            now - ChronoDuration::days(10),
        );
        let (busy, free) = (Uuid::new_v4(), Uuid::new_v4());
        for user in [busy, free] {
            let mut t = terms(now);
            t.period = ended;
            store.subscribe(user, t).await.unwrap();
            store.set_usage(user, 3).await.unwrap();
        }

        let rollover = crate::rollover::Rollover::new(store.clone());
        let held = store.lock_existing(busy).await.unwrap();
        let rolled = rollover.sweep(now).await.unwrap();

        assert_eq!(rolled.len(), 1);
        assert_eq!(rolled[0].user_id, free);
        assert_eq!(store.usage(free).await.unwrap(), Some(0));

        drop(held);
        assert_eq!(store.usage(busy).await.unwrap(), Some(3));
        let rolled = rollover.sweep(now).await.unwrap();
        assert_eq!(rolled.len(), 1);
        assert_eq!(rolled[0].user_id, busy);
        assert_eq!(store.usage(busy).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let store = MemoryQuotaStore::new(Duration::from_secs(1));
        let user = Uuid::new_v4();
        store.subscribe(user, terms(Utc::now())).await.unwrap();
        store.set_usage(user, 3).await.unwrap();

        store.reset_usage(user).await.unwrap();
        store.reset_usage(user).await.unwrap();
        assert_eq!(store.usage(user).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn negative_usage_is_refused() {
        let store = MemoryQuotaStore::new(Duration::from_secs(1));
        let res = store.set_usage(Uuid::new_v4(), -1).await;
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn cancel_flag_needs_active_subscription() {
        let store = MemoryQuotaStore::new(Duration::from_secs(1));
        let user = Uuid::new_v4();
        assert!(!store.set_cancel_at_period_end(user, true).await.unwrap());

        store.subscribe(user, terms(Utc::now())).await.unwrap();
        assert!(store.set_cancel_at_period_end(user, true).await.unwrap());
        assert!(store.terms(user).await.unwrap().unwrap().cancel_at_period_end);
    }
}
