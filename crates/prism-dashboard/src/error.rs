//! Dashboard error types.

use std::path::PathBuf;

use prism_analytics::AnalyticsError;

/// Errors surfaced by a fetch cycle or a drilldown lookup.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
  /// The record store failed.
  #[error(transparent)]
  Store(#[from] prism_store::Error),

  /// Fetched records could not be assembled.
  #[error(transparent)]
  Analytics(#[from] AnalyticsError),
}

/// Errors raised while loading a [`crate::DashboardConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// The config file could not be read.
  #[error("failed to read config file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The config file is not valid JSON for a config.
  #[error("failed to parse config file {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// A field holds a value the dashboard cannot use.
  #[error("invalid config value for '{field}': {message}")]
  Invalid {
    field: &'static str,
    message: String,
  },
}
