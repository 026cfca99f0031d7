//! Read-only financial reports: monthly profit per bus, profit-sharing
//! distribution and budget execution.
//!
//! Each report has a pure calculation over already-fetched rows and an async
//! loader that fetches those rows for one request.

pub mod budget_execution;
pub mod distribution;
pub mod period;
pub mod stats;

pub use budget_execution::{get_budget_execution, BudgetExecutionSummary, ExecutionStatus};
pub use distribution::{get_profit_distribution, Distribution};
pub use period::DateRange;
pub use stats::{get_monthly_stats, MonthlyStats, PeriodTotals};
