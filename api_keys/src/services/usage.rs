use chrono::{DateTime, Duration, Utc};
use common::error::Res;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dtos::usage::{DailyAverages, TopTool, UsageReport, UsageStatistics};

pub const REPORT_DAYS: i64 = 30;
const STATISTICS_DAYS: i64 = 365;
const TOP_TOOLS: i64 = 5;
const RECENT_RECORDS: i64 = 10;

pub async fn get_report(pool: &PgPool, user_id: Uuid, now: DateTime<Utc>) -> Res<UsageReport> {
    let since = now - Duration::days(REPORT_DAYS);

    let totals = db::usage::get_usage_totals(pool, user_id, since).await?;
    let top_tools = db::usage::get_top_tools(pool, user_id, since, TOP_TOOLS).await?;
    let recent = db::usage::get_recent_usages(pool, user_id, None, RECENT_RECORDS).await?;

    Ok(UsageReport {
        period_days: REPORT_DAYS,
        daily_averages: DailyAverages::over(&totals, REPORT_DAYS),
        totals,
        top_tools: TopTool::rank(top_tools),
        recent,
    })
}

pub async fn get_statistics(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<UsageStatistics> {
    let since = now - Duration::days(STATISTICS_DAYS);
    Ok(UsageStatistics {
        monthly: db::usage::get_monthly_usage(pool, user_id, since).await?,
        tools: db::usage::get_tool_totals(pool, user_id).await?,
    })
}
