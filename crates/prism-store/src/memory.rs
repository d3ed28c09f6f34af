use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use crate::{Error, ExecutionTrace, Filter, RecordSet, RecordStore};

/// In-memory record store.
///
/// Applies the filter the same way [`crate::SqliteStore`] does, using the local
/// time zone for day bounds. Suitable for tests and for record dumps loaded
/// from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  records: RecordSet,
}

impl MemoryStore {
  pub fn new(records: RecordSet) -> Self {
    Self { records }
  }

  /// Load a [`RecordSet`] serialized as JSON.
  pub async fn from_json_file(path: &Path) -> Result<Self, Error> {
    let content = tokio::fs::read_to_string(path).await?;
    let records: RecordSet = serde_json::from_str(&content)?;
    Ok(Self::new(records))
  }

  pub fn records(&self) -> &RecordSet {
    &self.records
  }
}

#[async_trait]
impl RecordStore for MemoryStore {
  async fn fetch(&self, filter: &Filter) -> Result<RecordSet, Error> {
    let mut executions: Vec<_> = self
      .records
      .executions
      .iter()
      .filter(|e| filter.matches(e))
      .cloned()
      .collect();
    executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let ids: HashSet<&str> = executions.iter().map(|e| e.id.as_str()).collect();

    let mut steps: Vec<_> = self
      .records
      .steps
      .iter()
      .filter(|s| ids.contains(s.execution_id.as_str()))
      .cloned()
      .collect();
    steps.sort_by_key(|s| s.step_order);

    let queue = self
      .records
      .queue
      .iter()
      .filter(|q| {
        q.workflow_execution_id
          .as_deref()
          .is_some_and(|id| ids.contains(id))
      })
      .cloned()
      .collect();

    Ok(RecordSet {
      executions,
      steps,
      queue,
    })
  }

  async fn fetch_execution(&self, execution_id: &str) -> Result<ExecutionTrace, Error> {
    let execution = self
      .records
      .executions
      .iter()
      .find(|e| e.id == execution_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))?;

    let mut steps: Vec<_> = self
      .records
      .steps
      .iter()
      .filter(|s| s.execution_id == execution_id)
      .cloned()
      .collect();
    steps.sort_by_key(|s| s.step_order);

    Ok(ExecutionTrace { execution, steps })
  }
}
