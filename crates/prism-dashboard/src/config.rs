//! Dashboard configuration.
//!
//! Configuration is a small JSON document. Every field is optional:
//!
//! ```json
//! {
//!   "database_url": "sqlite://runs.db",
//!   "executions_page_size": 50,
//!   "steps_page_size": 100,
//!   "search_limit": 50
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_EXECUTIONS_PAGE_SIZE: usize = 50;
pub const DEFAULT_STEPS_PAGE_SIZE: usize = 100;
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Settings shared by every dashboard view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
  /// Record store location, e.g. `sqlite://runs.db`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub database_url: Option<String>,
  /// Rows per page of the executions table.
  pub executions_page_size: usize,
  /// Rows per page of the steps table.
  pub steps_page_size: usize,
  /// Maximum executions listed by the drilldown search.
  pub search_limit: usize,
}

impl Default for DashboardConfig {
  fn default() -> Self {
    Self {
      database_url: None,
      executions_page_size: DEFAULT_EXECUTIONS_PAGE_SIZE,
      steps_page_size: DEFAULT_STEPS_PAGE_SIZE,
      search_limit: DEFAULT_SEARCH_LIMIT,
    }
  }
}

impl DashboardConfig {
  /// `~/.prism/config.json`, if a home directory is known.
  pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".prism").join("config.json"))
  }

  /// Load from `path` when given, else from [`Self::default_path`] when that
  /// file exists, else fall back to defaults.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = path {
      return Self::from_file(path);
    }
    match Self::default_path() {
      Some(path) if path.is_file() => Self::from_file(&path),
      _ => {
        debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  /// Read and validate a config file.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    for (field, value) in [
      ("executions_page_size", self.executions_page_size),
      ("steps_page_size", self.steps_page_size),
      ("search_limit", self.search_limit),
    ] {
      if value == 0 {
        return Err(ConfigError::Invalid {
          field,
          message: "must be at least 1".to_string(),
        });
      }
    }
    if self
      .database_url
      .as_deref()
      .is_some_and(|url| url.trim().is_empty())
    {
      return Err(ConfigError::Invalid {
        field: "database_url",
        message: "must not be blank".to_string(),
      });
    }
    Ok(())
  }
}
