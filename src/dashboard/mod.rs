//! The data behind the dashboard: client-side filters and the aggregated
//! figures shown in the metric cards and charts.

mod aggregation;
mod filters;
mod format;

pub use aggregation::{DashboardSummary, LabelCount, RiskCount, YearCount};
pub use filters::{FilterOptions, TransactionFilter};
pub use format::{format_count, format_rupees};
