use db::models::{
    invoice::Invoice,
    plan::Plan,
    subscription::{Subscription, SubscriptionDetails},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<Plan>,
}

/// Usage of the current billing period.
#[derive(Debug, Serialize, PartialEq)]
pub struct UsageSummary {
    pub api_calls_count: i64,
    pub api_calls_limit: Option<i64>,
    pub remaining: Option<i64>,
    pub percent_used: Option<f64>,
}

impl UsageSummary {
    pub fn new(api_calls_count: i64, api_calls_limit: Option<i64>) -> Self {
        let remaining = api_calls_limit.map(|limit| (limit - api_calls_count).max(0));
        let percent_used = api_calls_limit
            .filter(|limit| *limit > 0)
            .map(|limit| ((api_calls_count as f64 / limit as f64) * 100.0).min(100.0));
        Self {
            api_calls_count,
            api_calls_limit,
            remaining,
            percent_used,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub display_number: String,
}

impl From<Invoice> for InvoiceView {
    fn from(invoice: Invoice) -> Self {
        Self {
            display_number: invoice.display_number(),
            invoice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentSubscriptionResponse {
    pub subscription: Option<SubscriptionDetails>,
    pub usage: UsageSummary,
    pub invoices: Vec<InvoiceView>,
}

#[derive(Debug, Serialize)]
pub struct PlanChangeResponse {
    pub message: String,
    pub subscription: Subscription,
    pub invoice: Option<InvoiceView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_summary_within_limit() {
        let usage = UsageSummary::new(25, Some(100));
        assert_eq!(usage.remaining, Some(75));
        assert_eq!(usage.percent_used, Some(25.0));
    }

    #[test]
    fn usage_summary_never_goes_negative() {
        // a downgrade can leave the count above the new limit
        let usage = UsageSummary::new(150, Some(100));
        assert_eq!(usage.remaining, Some(0));
        assert_eq!(usage.percent_used, Some(100.0));
    }

    #[test]
    fn usage_summary_without_plan() {
        let usage = UsageSummary::new(0, None);
        assert_eq!(usage.remaining, None);
        assert_eq!(usage.percent_used, None);
    }
}
