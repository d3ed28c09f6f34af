//! Composite execution records.
//!
//! [`join`] attaches each fetched step and queue entry to its owning execution
//! by foreign key. Children whose key matches no fetched execution are dropped:
//! stores scope children to the execution id set they return.

use std::collections::{HashMap, HashSet};

use prism_store::{Execution, QueueEntry, QueueStatus, RecordSet, Step};
use serde::Serialize;

use crate::error::AnalyticsError;

/// An execution together with its steps and queue entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeExecution {
  #[serde(flatten)]
  pub execution: Execution,
  /// Steps in fetch order.
  pub steps: Vec<Step>,
  /// Queue entries in fetch order.
  pub queue: Vec<QueueEntry>,
}

impl CompositeExecution {
  /// Steps stably sorted by `step_order`, for display.
  pub fn ordered_steps(&self) -> Vec<&Step> {
    let mut steps: Vec<&Step> = self.steps.iter().collect();
    steps.sort_by_key(|s| s.step_order);
    steps
  }

  /// Status of the first fetched queue entry.
  pub fn current_queue_status(&self) -> Option<QueueStatus> {
    self.queue.first().map(|q| q.status)
  }
}

impl AsRef<Execution> for CompositeExecution {
  fn as_ref(&self) -> &Execution {
    &self.execution
  }
}

/// Join one fetch cycle's flat collections into composite records.
///
/// Output order follows `records.executions`. Fails on the first record that
/// is missing an identity, repeats an execution id, or carries a negative
/// latency or token count.
pub fn join(records: RecordSet) -> Result<Vec<CompositeExecution>, AnalyticsError> {
  let RecordSet {
    executions,
    steps,
    queue,
  } = records;

  {
    let mut seen = HashSet::with_capacity(executions.len());
    for execution in &executions {
      validate_execution(execution)?;
      if !seen.insert(execution.id.as_str()) {
        return Err(AnalyticsError::violation(
          "execution",
          &execution.id,
          "duplicate id",
        ));
      }
    }
  }

  let mut steps_by_execution: HashMap<String, Vec<Step>> = HashMap::new();
  for step in steps {
    validate_step(&step)?;
    steps_by_execution
      .entry(step.execution_id.clone())
      .or_default()
      .push(step);
  }

  let mut queue_by_execution: HashMap<String, Vec<QueueEntry>> = HashMap::new();
  for entry in queue {
    if entry.id.is_empty() {
      return Err(AnalyticsError::violation("queue entry", "", "missing id"));
    }
    if let Some(execution_id) = entry.workflow_execution_id.clone() {
      queue_by_execution
        .entry(execution_id)
        .or_default()
        .push(entry);
    }
  }

  Ok(
    executions
      .into_iter()
      .map(|execution| CompositeExecution {
        steps: steps_by_execution
          .remove(&execution.id)
          .unwrap_or_default(),
        queue: queue_by_execution
          .remove(&execution.id)
          .unwrap_or_default(),
        execution,
      })
      .collect(),
  )
}

/// Project composite records back into flat collections.
pub fn flatten(records: &[CompositeExecution]) -> RecordSet {
  RecordSet {
    executions: records.iter().map(|r| r.execution.clone()).collect(),
    steps: records.iter().flat_map(|r| r.steps.iter().cloned()).collect(),
    queue: records.iter().flat_map(|r| r.queue.iter().cloned()).collect(),
  }
}

/// Every step across `records`, concatenated in execution order.
pub fn all_steps(records: &[CompositeExecution]) -> Vec<&Step> {
  records.iter().flat_map(|r| r.steps.iter()).collect()
}

fn validate_execution(execution: &Execution) -> Result<(), AnalyticsError> {
  if execution.id.is_empty() {
    return Err(AnalyticsError::violation("execution", "", "missing id"));
  }
  if execution.total_latency_ms.is_some_and(|ms| ms < 0) {
    return Err(AnalyticsError::violation(
      "execution",
      &execution.id,
      "negative total_latency_ms",
    ));
  }
  if execution.input_tokens < 0 || execution.output_tokens < 0 || execution.total_tokens < 0 {
    return Err(AnalyticsError::violation(
      "execution",
      &execution.id,
      "negative token count",
    ));
  }
  Ok(())
}

fn validate_step(step: &Step) -> Result<(), AnalyticsError> {
  if step.id.is_empty() {
    return Err(AnalyticsError::violation("step", "", "missing id"));
  }
  if step.execution_id.is_empty() {
    return Err(AnalyticsError::violation(
      "step",
      &step.id,
      "missing execution_id",
    ));
  }
  if step.latency_ms.is_some_and(|ms| ms < 0) {
    return Err(AnalyticsError::violation("step", &step.id, "negative latency_ms"));
  }
  if step.input_tokens < 0 || step.output_tokens < 0 {
    return Err(AnalyticsError::violation("step", &step.id, "negative token count"));
  }
  Ok(())
}
