//! Prism Analytics
//!
//! Pure computations over one fetch cycle's records:
//! - [`join`] assembles composite executions and rejects malformed records
//! - [`metrics`] derives the summary cards, distributions and the daily trend
//! - [`pagination`] slices tables into 1-based pages
//!
//! Nothing here performs I/O. Every function takes the slice it aggregates and
//! returns a new value, so callers can recompute freely after each fetch.

mod error;
mod join;
pub mod metrics;
pub mod pagination;

pub use error::AnalyticsError;
pub use join::{CompositeExecution, all_steps, flatten, join};
pub use metrics::{
  ErrorRateBand, ExecutionSummary, ModelUsage, StatusSlice, StepLatency, StepStatusCount,
  TrendPoint, execution_trend, latency_by_step, model_usage, nearest_rank, status_distribution,
  step_status_distribution, summarize,
};
pub use pagination::{PageCursor, PageInfo, paginate, total_pages};
