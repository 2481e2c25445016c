use std::future::Future;

use chrono::{DateTime, Utc};
use common::error::Res;
use uuid::Uuid;

use crate::gate::{BillingPeriod, Decision, QuotaSnapshot, SubscriptionTerms};

pub mod memory;
pub mod postgres;

/// How a due subscription leaves its billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodClose {
    /// Continues into the given period with a fresh count.
    Renewed(BillingPeriod),
    /// Was set to cancel at period end and is now cancelled.
    Cancelled,
}

/// Persistence for usage counts, serialized per user.
///
/// Every method that reads and then writes a user's quota does so while
/// holding that user's lock. Locks of different users never contend.
pub trait QuotaStore: Send + Sync {
    /// Locks the user, hands the snapshot to `decide`, and stores the new
    /// count when the decision admits. Nothing is written on rejection.
    fn admit_with<F>(&self, user_id: Uuid, decide: F) -> impl Future<Output = Res<Decision>> + Send
    where
        F: FnOnce(&QuotaSnapshot) -> Decision + Send;

    /// Moves the user's subscription to `period`. The count is reset only
    /// when the period end actually changes. Returns whether it was reset.
    fn roll_period(
        &self,
        user_id: Uuid,
        period: BillingPeriod,
    ) -> impl Future<Output = Res<bool>> + Send;

    fn reset_usage(&self, user_id: Uuid) -> impl Future<Output = Res<()>> + Send;

    /// Users with an active subscription whose period ended before `now`.
    fn due_for_rollover(&self, now: DateTime<Utc>) -> impl Future<Output = Res<Vec<Uuid>>> + Send;

    /// Locks the user and applies whatever `decide` returns for the current
    /// terms. `None` from `decide` (or no subscription) leaves everything as is.
    fn close_period_with<F>(
        &self,
        user_id: Uuid,
        decide: F,
    ) -> impl Future<Output = Res<Option<PeriodClose>>> + Send
    where
        F: FnOnce(&SubscriptionTerms) -> Option<PeriodClose> + Send;
}
