use chrono::{DateTime, Duration, Months, Utc};
use common::error::{AppError, Res};
use db::models::subscription::SubscriptionStatus;
use uuid::Uuid;

use crate::{
    gate::{BillingPeriod, SubscriptionTerms},
    store::{PeriodClose, QuotaStore},
};

/// One subscription that left its billing period during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rolled {
    pub user_id: Uuid,
    pub close: PeriodClose,
}

fn add_month(at: DateTime<Utc>) -> DateTime<Utc> {
    at.checked_add_months(Months::new(1))
        .unwrap_or(at + Duration::days(30))
}

/// The first monthly period of a subscription started at `now`.
pub fn first_period(now: DateTime<Utc>) -> BillingPeriod {
    BillingPeriod::new(now, add_month(now))
}

/// The monthly period following `period` that covers `now`. Periods are
/// chained end to start, so skipped months are not billed twice.
pub fn next_period(period: BillingPeriod, now: DateTime<Utc>) -> BillingPeriod {
    let mut next = BillingPeriod::new(period.end, add_month(period.end));
    while next.end < now {
        next = BillingPeriod::new(next.end, add_month(next.end));
    }
    next
}

/// What happens to a subscription at `now`; `None` while it is not due.
pub fn plan_close(terms: &SubscriptionTerms, now: DateTime<Utc>) -> Option<PeriodClose> {
    if terms.status != SubscriptionStatus::Active || terms.period.end >= now {
        return None;
    }
    if terms.cancel_at_period_end {
        return Some(PeriodClose::Cancelled);
    }
    Some(PeriodClose::Renewed(next_period(terms.period, now)))
}

/// Periodic billing-period rollover over a quota store.
pub struct Rollover<S> {
    store: S,
}

impl<S: QuotaStore> Rollover<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Closes every period that ended before `now`. Each user is re-checked
    /// under their lock, so running the sweep twice changes nothing the
    /// second time. A user whose lock is busy is left for the next sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Res<Vec<Rolled>> {
        let due = self.store.due_for_rollover(now).await?;
        let mut rolled = Vec::with_capacity(due.len());

        for user_id in due {
            match self
                .store
                .close_period_with(user_id, |terms| plan_close(terms, now))
                .await
            {
                Ok(Some(close)) => rolled.push(Rolled { user_id, close }),
                Ok(None) => {}
                Err(AppError::LockTimeout(e)) => {
                    log::warn!("Skipping rollover for user {}: {}", user_id, e)
                }
                Err(e) => log::error!("Rollover failed for user {}: {}", user_id, e),
            }
        }

        if !rolled.is_empty() {
            log::info!("Rolled over {} subscription(s)", rolled.len());
        }
        Ok(rolled)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::TimeZone;

    use super::*;
    use crate::store::memory::MemoryQuotaStore;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn terms(period: BillingPeriod) -> SubscriptionTerms {
        SubscriptionTerms {
            status: SubscriptionStatus::Active,
            period,
            cancel_at_period_end: false,
            api_calls_limit: 100,
        }
    }

    #[test]
    fn first_period_is_one_month() {
        let period = first_period(utc(2025, 3, 15));
        assert_eq!(period, BillingPeriod::new(utc(2025, 3, 15), utc(2025, 4, 15)));
    }

    #[test]
    fn next_period_starts_at_previous_end() {
        let period = BillingPeriod::new(utc(2025, 1, 1), utc(2025, 2, 1));
        assert_eq!(
            next_period(period, utc(2025, 2, 2)),
            BillingPeriod::new(utc(2025, 2, 1), utc(2025, 3, 1))
        );
    }

    #[test]
    fn next_period_skips_missed_months() {
        let period = BillingPeriod::new(utc(2025, 1, 1), utc(2025, 2, 1));
        let next = next_period(period, utc(2025, 5, 15));
        assert_eq!(next, BillingPeriod::new(utc(2025, 5, 1), utc(2025, 6, 1)));
        assert!(next.contains(utc(2025, 5, 15)));
    }

    #[test]
    fn month_end_is_clamped() {
        let period = BillingPeriod::new(utc(2024, 12, 31), utc(2025, 1, 31));
        assert_eq!(next_period(period, utc(2025, 2, 1)).end, utc(2025, 2, 28));
    }

    #[test]
    fn plan_close_cases() {
        let period = BillingPeriod::new(utc(2025, 1, 1), utc(2025, 2, 1));
        let mut t = terms(period);

        assert_eq!(plan_close(&t, utc(2025, 2, 1)), None);
        assert!(matches!(
            plan_close(&t, utc(2025, 2, 2)),
            Some(PeriodClose::Renewed(_))
        ));

        t.cancel_at_period_end = true;
        assert_eq!(plan_close(&t, utc(2025, 2, 2)), Some(PeriodClose::Cancelled));

        t.status = SubscriptionStatus::Cancelled;
        assert_eq!(plan_close(&t, utc(2025, 2, 2)), None);
    }

    #[tokio::test]
    async fn sweep_resets_renewals_and_cancels_pending() {
        let store = MemoryQuotaStore::new(StdDuration::from_secs(1));
        let period = BillingPeriod::new(utc(2025, 1, 1), utc(2025, 2, 1));
        let now = utc(2025, 2, 10);

        let renewing = Uuid::new_v4();
        store.subscribe(renewing, terms(period)).await.unwrap();
        store.set_usage(renewing, 80).await.unwrap();

        let leaving = Uuid::new_v4();
        let mut t = terms(period);
        t.cancel_at_period_end = true;
        store.subscribe(leaving, t).await.unwrap();
        store.set_usage(leaving, 40).await.unwrap();

        let current = Uuid::new_v4();
        store
            .subscribe(current, terms(BillingPeriod::new(utc(2025, 2, 1), utc(2025, 3, 1))))
            .await
            .unwrap();
        store.set_usage(current, 5).await.unwrap();

        let rollover = Rollover::new(store.clone());
        let mut rolled = rollover.sweep(now).await.unwrap();
        rolled.sort_by_key(|r| r.user_id == leaving);

        assert_eq!(
            rolled,
            vec![
                Rolled {
                    user_id: renewing,
                    close: PeriodClose::Renewed(BillingPeriod::new(
                        utc(2025, 2, 1),
                        utc(2025, 3, 1),
                    )),
                },
                Rolled {
                    user_id: leaving,
                    close: PeriodClose::Cancelled,
                },
            ]
        );
        assert_eq!(store.usage(renewing).await.unwrap(), Some(0));
        assert_eq!(store.usage(leaving).await.unwrap(), Some(40));
        assert_eq!(
            store.terms(leaving).await.unwrap().unwrap().status,
            SubscriptionStatus::Cancelled
        );
        assert_eq!(store.usage(current).await.unwrap(), Some(5));

        // a second pass over the same instant is a no-op
        assert!(rollover.sweep(now).await.unwrap().is_empty());
        assert_eq!(store.usage(renewing).await.unwrap(), Some(0));
    }
}
