//! Admission decisions for metered calls.
//!
//! A metered call is admitted only while the caller has an active
//! subscription whose billing period covers the call and whose usage count
//! is still below the plan limit. The check and the increment happen under
//! one per-user lock held by the [`QuotaStore`], so concurrent calls of the
//! same user can never push the count past the limit.

use chrono::{DateTime, Utc};
use common::{
    env_config::QuotaConfig,
    error::{AppError, Res},
};
use db::models::subscription::{SubscriptionDetails, SubscriptionStatus};
use uuid::Uuid;

use crate::store::QuotaStore;

/// Inclusive `[start, end]` window a subscription's usage is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BillingPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// The subscription fields the gate looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTerms {
    pub status: SubscriptionStatus,
    pub period: BillingPeriod,
    pub cancel_at_period_end: bool,
    pub api_calls_limit: i64,
}

impl From<&SubscriptionDetails> for SubscriptionTerms {
    fn from(details: &SubscriptionDetails) -> Self {
        let sub = &details.subscription;
        SubscriptionTerms {
            status: sub.status,
            period: BillingPeriod::new(sub.start_date, sub.end_date),
            cancel_at_period_end: sub.cancel_at_period_end,
            api_calls_limit: details.api_calls_limit,
        }
    }
}

/// State read under the user's lock.
#[derive(Debug, Clone, Default)]
pub struct QuotaSnapshot {
    pub usage_count: i64,
    pub subscription: Option<SubscriptionTerms>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoActiveSubscription,
    PendingCancellation,
    LimitExceeded { limit: i64, usage: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Admitted; `usage` is the count after this call.
    Admit { usage: i64, limit: i64 },
    Reject(Rejection),
}

/// An admitted call, as seen by request handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub usage: i64,
    pub limit: i64,
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    /// Turns a rejection into the error the HTTP layer reports.
    pub fn into_admission(self) -> Res<Admission> {
        match self {
            Decision::Admit { usage, limit } => Ok(Admission { usage, limit }),
            Decision::Reject(Rejection::NoActiveSubscription) => Err(AppError::Forbidden(
                "No active subscription found".to_string(),
            )),
            Decision::Reject(Rejection::PendingCancellation) => Err(AppError::Forbidden(
                "Subscription is scheduled for cancellation".to_string(),
            )),
            Decision::Reject(Rejection::LimitExceeded { limit, usage }) => {
                Err(AppError::QuotaExceeded { limit, usage })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    /// Reject calls while the subscription is set to end with the period.
    pub deny_pending_cancellation: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            deny_pending_cancellation: true,
        }
    }
}

impl From<&QuotaConfig> for GatePolicy {
    fn from(config: &QuotaConfig) -> Self {
        Self {
            deny_pending_cancellation: config.deny_pending_cancellation,
        }
    }
}

/// Decides a single call against a locked snapshot. Never mutates.
pub fn evaluate(snapshot: &QuotaSnapshot, policy: &GatePolicy, now: DateTime<Utc>) -> Decision {
    let Some(terms) = &snapshot.subscription else {
        return Decision::Reject(Rejection::NoActiveSubscription);
    };

    if terms.status != SubscriptionStatus::Active || !terms.period.contains(now) {
        return Decision::Reject(Rejection::NoActiveSubscription);
    }

    if terms.cancel_at_period_end && policy.deny_pending_cancellation {
        return Decision::Reject(Rejection::PendingCancellation);
    }

    if snapshot.usage_count >= terms.api_calls_limit {
        return Decision::Reject(Rejection::LimitExceeded {
            limit: terms.api_calls_limit,
            usage: snapshot.usage_count,
        });
    }

    Decision::Admit {
        usage: snapshot.usage_count + 1,
        limit: terms.api_calls_limit,
    }
}

/// The limit-enforcement gate in front of every metered operation.
pub struct Gate<S> {
    store: S,
    policy: GatePolicy,
}

impl<S: QuotaStore> Gate<S> {
    pub fn new(store: S, policy: GatePolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Locks the user's quota, decides, and on admission increments the
    /// count before the lock is released. Rejections leave the count as is.
    pub async fn authorize(&self, user_id: Uuid, now: DateTime<Utc>) -> Res<Decision> {
        let policy = self.policy;
        let decision = self
            .store
            .admit_with(user_id, move |snapshot| evaluate(snapshot, &policy, now))
            .await?;

        match decision {
            Decision::Admit { usage, limit } => {
                log::debug!("Admitted call for user {} ({}/{})", user_id, usage, limit)
            }
            Decision::Reject(reason) => {
                log::info!("Rejected call for user {}: {:?}", user_id, reason)
            }
        }

        Ok(decision)
    }

    /// `authorize` at the current time, with rejections as errors.
    pub async fn admit(&self, user_id: Uuid) -> Res<Admission> {
        self.authorize(user_id, Utc::now()).await?.into_admission()
    }
}
