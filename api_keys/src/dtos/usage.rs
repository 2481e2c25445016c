use db::models::usage::{MonthlyUsage, ToolUsage, ToolUsageStat, UsageTotals};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
pub struct DailyAverages {
    pub calls: f64,
    pub tokens: f64,
    pub cost_micros: f64,
}

impl DailyAverages {
    pub fn over(totals: &UsageTotals, days: i64) -> Self {
        let days = days.max(1) as f64;
        Self {
            calls: totals.calls as f64 / days,
            tokens: totals.total_tokens as f64 / days,
            cost_micros: totals.total_cost_micros as f64 / days,
        }
    }
}

/// A frequently used tool with its share of the listed tools' calls.
#[derive(Debug, Serialize)]
pub struct TopTool {
    #[serde(flatten)]
    pub stat: ToolUsageStat,
    pub usage_percentage: f64,
}

impl TopTool {
    /// Percentages are relative to the calls of the given tools only, so a
    /// non-empty list always adds up to 100.
    pub fn rank(stats: Vec<ToolUsageStat>) -> Vec<Self> {
        let total: i64 = stats.iter().map(|s| s.total_uses).sum();
        stats
            .into_iter()
            .map(|stat| {
                let usage_percentage = if total > 0 {
                    stat.total_uses as f64 * 100.0 / total as f64
                } else {
                    0.0
                };
                TopTool {
                    stat,
                    usage_percentage,
                }
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct UsageReport {
    pub period_days: i64,
    pub totals: UsageTotals,
    pub daily_averages: DailyAverages,
    pub top_tools: Vec<TopTool>,
    pub recent: Vec<ToolUsage>,
}

/// Long-range view: one bucket per calendar month of the last year and
/// per-tool totals over the whole history.
#[derive(Debug, Serialize)]
pub struct UsageStatistics {
    pub monthly: Vec<MonthlyUsage>,
    pub tools: Vec<ToolUsageStat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_spread_totals_over_the_window() {
        let totals = UsageTotals {
            calls: 60,
            total_tokens: 6000,
            total_cost_micros: 90_000,
        };
        assert_eq!(
            DailyAverages::over(&totals, 30),
            DailyAverages {
                calls: 2.0,
                tokens: 200.0,
                cost_micros: 3000.0,
            }
        );
    }

    fn stat(name: &str, total_uses: i64) -> ToolUsageStat {
        ToolUsageStat {
            tool_name: name.to_string(),
            total_uses,
            total_tokens: total_uses * 100,
            total_cost_micros: 0,
        }
    }

    #[test]
    fn top_tools_share_their_calls() {
        let ranked = TopTool::rank(vec![stat("Story Writer Pro", 6), stat("Code Reviewer", 2)]);
        assert_eq!(ranked[0].usage_percentage, 75.0);
        assert_eq!(ranked[1].usage_percentage, 25.0);
        assert_eq!(ranked[0].stat.tool_name, "Story Writer Pro");
    }

    #[test]
    fn no_calls_means_zero_percent() {
        let ranked = TopTool::rank(vec![stat("Data Insights", 0)]);
        assert_eq!(ranked[0].usage_percentage, 0.0);
        assert!(TopTool::rank(Vec::new()).is_empty());
    }

    #[test]
    fn empty_window_does_not_divide_by_zero() {
        let avg = DailyAverages::over(&UsageTotals::default(), 0);
        assert_eq!(avg.calls, 0.0);
    }
}
