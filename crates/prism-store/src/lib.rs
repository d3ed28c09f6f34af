//! Prism Store
//!
//! This crate provides the record types, the filter model and the read-only
//! record store trait for Prism. A store answers one question: given a
//! [`Filter`], which executions match, and which steps and queue entries
//! belong to them.
//!
//! The [`RecordStore`] trait defines operations for:
//! - Fetching the executions matching a filter together with their children
//! - Fetching a single execution trace by exact id
//!
//! Implementations:
//! - [`SqliteStore`] queries a SQLite database
//! - [`MemoryStore`] filters an in-memory [`RecordSet`]

mod filter;
mod memory;
mod sqlite;
mod types;

use std::sync::Arc;

pub use filter::{Filter, FilterParams, contains_ignore_case};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
  Execution, ExecutionStatus, ExecutionTrace, ParseStatusError, QueueEntry, QueueStatus,
  RecordSet, Step, StepStatus,
};

use async_trait::async_trait;

/// Error type for fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  /// Reading a record file failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A record file could not be decoded.
  #[error("decode error: {0}")]
  Decode(#[from] serde_json::Error),

  /// The remote store rejected or failed the request.
  #[error("fetch failed: {0}")]
  Fetch(String),
}

/// Read-only access to execution records.
///
/// Steps and queue entries returned by [`RecordStore::fetch`] are scoped to
/// exactly the returned executions. Executions come back most recent first and
/// steps in ascending `step_order`.
#[async_trait]
pub trait RecordStore: Send + Sync {
  /// Fetch the executions matching `filter` and their steps and queue entries.
  async fn fetch(&self, filter: &Filter) -> Result<RecordSet, Error>;

  /// Fetch one execution by exact id, regardless of any filter.
  async fn fetch_execution(&self, execution_id: &str) -> Result<ExecutionTrace, Error>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
  async fn fetch(&self, filter: &Filter) -> Result<RecordSet, Error> {
    (**self).fetch(filter).await
  }

  async fn fetch_execution(&self, execution_id: &str) -> Result<ExecutionTrace, Error> {
    (**self).fetch_execution(execution_id).await
  }
}
