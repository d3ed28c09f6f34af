//! Prism Dashboard
//!
//! Glue between a [`prism_store::RecordStore`] and the dashboard tabs:
//! - [`DataSource`] runs fetch cycles and publishes [`Snapshot`]s
//! - [`Navigator`] tracks the active tab and the selected execution
//! - [`views`] turns a snapshot's records into serializable tab models
//! - [`DashboardConfig`] holds page sizes and the store location

mod config;
mod error;
mod navigation;
mod source;
pub mod views;

pub use config::{
  DEFAULT_EXECUTIONS_PAGE_SIZE, DEFAULT_SEARCH_LIMIT, DEFAULT_STEPS_PAGE_SIZE, DashboardConfig,
};
pub use error::{ConfigError, DashboardError};
pub use navigation::{EXECUTION_FRAGMENT_PREFIX, Navigator, Tab};
pub use source::{DataSource, Snapshot};
pub use views::{Drilldown, ExecutionRow, Overview, StepRow, StepsAnalysis};
