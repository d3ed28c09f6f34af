use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use crate::{Error, Execution, ExecutionTrace, Filter, QueueEntry, RecordSet, RecordStore, Step};

const EXECUTION_COLUMNS: &str = "id, workflow_id, overall_status, created_at, updated_at, \
  completed_at, total_latency_ms, COALESCE(input_tokens, 0) AS input_tokens, \
  COALESCE(output_tokens, 0) AS output_tokens, COALESCE(total_tokens, 0) AS total_tokens, \
  payload, tool_usage, error_message, response_data";

const STEP_COLUMNS: &str = "id, execution_id, step_name, step_order, status, created_at, \
  completed_at, latency_ms, COALESCE(input_tokens, 0) AS input_tokens, \
  COALESCE(output_tokens, 0) AS output_tokens, model_name, error_message, response_data";

const QUEUE_COLUMNS: &str = "id, workflow_execution_id, status, created_at, updated_at";

/// Upper bound on ids bound into a single `IN (...)` list.
const IN_LIST_CHUNK: usize = 500;

/// SQLite-based record store.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open a read-only connection pool for `url` (e.g. `sqlite://runs.db`).
  pub async fn connect(url: &str) -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str(url)?.read_only(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(Self::new(pool))
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  async fn fetch_executions(&self, filter: &Filter) -> Result<Vec<Execution>, Error> {
    let params = filter.params();

    let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
      "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE 1 = 1"
    ));
    if let Some(pattern) = params.workflow_pattern {
      query
        .push(" AND LOWER(workflow_id) LIKE ")
        .push_bind(pattern)
        .push(" ESCAPE '\\'");
    }
    if let Some(pattern) = params.execution_pattern {
      query
        .push(" AND LOWER(id) LIKE ")
        .push_bind(pattern)
        .push(" ESCAPE '\\'");
    }
    if let Some(status) = params.overall_status {
      query.push(" AND overall_status = ").push_bind(status);
    }
    if let Some(from) = params.created_from {
      query
        .push(" AND julianday(created_at) >= julianday(")
        .push_bind(from)
        .push(")");
    }
    if let Some(to) = params.created_to {
      query
        .push(" AND julianday(created_at) <= julianday(")
        .push_bind(to)
        .push(")");
    }
    // Stored timestamps may use `Z`, an offset or a space separator, so compare
    // instants rather than text.
    query.push(" ORDER BY julianday(created_at) DESC");

    Ok(
      query
        .build_query_as::<Execution>()
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn fetch_steps(&self, execution_ids: &[String]) -> Result<Vec<Step>, Error> {
    let mut steps: Vec<Step> = Vec::new();
    for chunk in execution_ids.chunks(IN_LIST_CHUNK) {
      let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
        "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE execution_id IN ("
      ));
      let mut ids = query.separated(", ");
      for id in chunk {
        ids.push_bind(id.clone());
      }
      ids.push_unseparated(") ORDER BY step_order ASC, rowid ASC");

      steps.extend(query.build_query_as::<Step>().fetch_all(&self.pool).await?);
    }
    // Chunks are ordered individually; restore a single ascending order.
    steps.sort_by_key(|s| s.step_order);
    Ok(steps)
  }

  async fn fetch_queue(&self, execution_ids: &[String]) -> Result<Vec<QueueEntry>, Error> {
    let mut entries = Vec::new();
    for chunk in execution_ids.chunks(IN_LIST_CHUNK) {
      let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
        "SELECT {QUEUE_COLUMNS} FROM workflow_queue WHERE workflow_execution_id IN ("
      ));
      let mut ids = query.separated(", ");
      for id in chunk {
        ids.push_bind(id.clone());
      }
      ids.push_unseparated(") ORDER BY rowid ASC");

      entries.extend(
        query
          .build_query_as::<QueueEntry>()
          .fetch_all(&self.pool)
          .await?,
      );
    }
    Ok(entries)
  }
}

#[async_trait]
impl RecordStore for SqliteStore {
  #[instrument(name = "sqlite_fetch", skip(self))]
  async fn fetch(&self, filter: &Filter) -> Result<RecordSet, Error> {
    let executions = self.fetch_executions(filter).await?;
    if executions.is_empty() {
      return Ok(RecordSet::default());
    }

    let ids: Vec<String> = executions.iter().map(|e| e.id.clone()).collect();
    let steps = self.fetch_steps(&ids).await?;
    let queue = self.fetch_queue(&ids).await?;

    debug!(
      executions = executions.len(),
      steps = steps.len(),
      queue = queue.len(),
      "fetched records"
    );

    Ok(RecordSet {
      executions,
      steps,
      queue,
    })
  }

  #[instrument(name = "sqlite_fetch_execution", skip(self))]
  async fn fetch_execution(&self, execution_id: &str) -> Result<ExecutionTrace, Error> {
    let execution_sql = format!("SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE id = ?");
    let execution: Execution = sqlx::query_as(&execution_sql)
      .bind(execution_id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))?;

    let steps_sql = format!(
      "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE execution_id = ? \
       ORDER BY step_order ASC, rowid ASC"
    );
    let steps: Vec<Step> = sqlx::query_as(&steps_sql)
      .bind(execution_id)
      .fetch_all(&self.pool)
      .await?;

    Ok(ExecutionTrace { execution, steps })
  }
}
