use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::{
    dtos::subscription::SubscriptionCreateRequest,
    models::{
        plan::Plan,
        subscription::{Subscription, SubscriptionStatus},
    },
};
use limiter::store::postgres::PgQuotaStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    dtos::sub::{CurrentSubscriptionResponse, InvoiceView, PlanChangeResponse, UsageSummary},
    services::invoice,
};

const RECENT_INVOICES: i64 = 12;

/// What choosing a plan does to the user's single subscription row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanChange {
    AlreadySubscribed,
    /// Active subscription moves to another plan; period and usage stay.
    Switch,
    /// A cancelled, expired or past-due subscription starts over.
    Restart,
    Create,
}

pub fn plan_change(current: Option<&Subscription>, plan_id: Uuid) -> PlanChange {
    match current {
        None => PlanChange::Create,
        Some(sub) if sub.status != SubscriptionStatus::Active => PlanChange::Restart,
        Some(sub) if sub.plan_id == plan_id => PlanChange::AlreadySubscribed,
        Some(_) => PlanChange::Switch,
    }
}

pub async fn get_plans(pool: &PgPool) -> Res<Vec<Plan>> {
    db::plan::get_active_plans(pool).await
}

pub async fn get_current(pool: &PgPool, user_id: Uuid) -> Res<CurrentSubscriptionResponse> {
    let profile = db::profile::get_profile(pool, user_id).await?;
    let subscription = db::subscription::get_subscription_details(pool, user_id).await?;
    let invoices = db::invoice::get_recent_invoices(pool, user_id, RECENT_INVOICES).await?;

    let limit = subscription
        .as_ref()
        .filter(|details| details.subscription.status == SubscriptionStatus::Active)
        .map(|details| details.api_calls_limit);

    Ok(CurrentSubscriptionResponse {
        subscription,
        usage: UsageSummary::new(profile.api_calls_count, limit),
        invoices: invoices.into_iter().map(InvoiceView::from).collect(),
    })
}

/// Subscribes the user to `plan_slug` or moves them onto it.
///
/// Runs under the user's quota row lock so it cannot interleave with a
/// metered call, and waits for that lock no longer than a gate call does. A
/// new or restarted subscription starts a fresh period with a zero count;
/// landing on a paid plan issues an open invoice.
pub async fn change_plan(
    store: &PgQuotaStore,
    user_id: Uuid,
    plan_slug: &str,
    now: DateTime<Utc>,
) -> Res<PlanChangeResponse> {
    let mut tx = store.begin().await?;

    if PgQuotaStore::lock_user(&mut tx, user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Profile for user {} not found", user_id)));
    }
    let plan = db::plan::get_active_plan_by_slug(&mut *tx, plan_slug).await?;
    let current = db::subscription::get_subscription_by_user(&mut *tx, user_id).await?;

    let (subscription, message) = match plan_change(current.as_ref(), plan.id) {
        PlanChange::AlreadySubscribed => {
            return Err(AppError::BadRequest(
                "You are already subscribed to this plan".to_string(),
            ));
        }
        PlanChange::Switch => (
            db::subscription::update_plan(&mut *tx, user_id, plan.id).await?,
            format!("Successfully switched to {} plan", plan.name),
        ),
        change @ (PlanChange::Restart | PlanChange::Create) => {
            let period = limiter::rollover::first_period(now);
            let req = SubscriptionCreateRequest {
                user_id,
                plan_id: plan.id,
                start_date: period.start,
                end_date: period.end,
            };
            let subscription = if change == PlanChange::Create {
                db::subscription::insert_subscription(&mut *tx, req).await?
            } else {
                db::subscription::restart_subscription(&mut *tx, req).await?
            };
            db::profile::set_usage_count(&mut *tx, user_id, 0).await?;
            (
                subscription,
                format!("Successfully subscribed to {} plan", plan.name),
            )
        }
    };

    let invoice = if plan.is_free() {
        None
    } else {
        Some(
            invoice::issue_open_invoice(
                &mut *tx,
                user_id,
                subscription.id,
                plan.price_cents,
                &plan.currency,
                now.date_naive(),
            )
            .await?,
        )
    };

    db::activity::insert_activity(&mut *tx, user_id, "subscription_change", &message).await?;
    tx.commit().await?;

    log::info!("User {} is now on plan {}", user_id, plan.slug);
    Ok(PlanChangeResponse {
        message,
        subscription,
        invoice: invoice.map(InvoiceView::from),
    })
}

/// Sets or clears `cancel_at_period_end` on the active subscription.
pub async fn set_cancel_at_period_end(
    pool: &PgPool,
    user_id: Uuid,
    cancel: bool,
) -> Res<Subscription> {
    let mut tx = pool.begin().await?;
    let subscription = db::subscription::set_cancel_at_period_end(&mut *tx, user_id, cancel)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription found".to_string()))?;

    let description = if cancel {
        "Scheduled subscription cancellation at period end"
    } else {
        "Reactivated subscription"
    };
    db::activity::insert_activity(&mut *tx, user_id, "subscription_change", description).await?;
    tx.commit().await?;
    Ok(subscription)
}
