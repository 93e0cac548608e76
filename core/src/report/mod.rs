mod aggregator;
mod types;

pub use aggregator::ResultAggregator;
pub use types::{ReportSummary, SkipReason, SwarmReport, TaskReport, TaskStatus};
