use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Success,
  Failed,
  Running,
  Pending,
  Cancelled,
}

/// Status of a single step within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StepStatus {
  Success,
  Failed,
  Running,
  Pending,
}

/// Status of a queue entry attached to an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QueueStatus {
  Pending,
  Updated,
  Failed,
}

/// Returned when a status string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(pub String);

macro_rules! status_strings {
  ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
    impl $ty {
      /// The wire value of this status.
      pub fn as_str(&self) -> &'static str {
        match self {
          $(Self::$variant => $text,)+
        }
      }

      /// Display label: the wire value with its first character upper-cased.
      pub fn label(&self) -> String {
        capitalize(self.as_str())
      }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $ty {
      type Err = ParseStatusError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $($text => Ok(Self::$variant),)+
          other => Err(ParseStatusError(other.to_string())),
        }
      }
    }
  };
}

status_strings!(ExecutionStatus {
  Success => "success",
  Failed => "failed",
  Running => "running",
  Pending => "pending",
  Cancelled => "cancelled",
});

status_strings!(StepStatus {
  Success => "success",
  Failed => "failed",
  Running => "running",
  Pending => "pending",
});

status_strings!(QueueStatus {
  Pending => "pending",
  Updated => "updated",
  Failed => "failed",
});

fn capitalize(value: &str) -> String {
  let mut chars = value.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// A recorded workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Execution {
  pub id: String,
  pub workflow_id: String,
  pub overall_status: ExecutionStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub total_latency_ms: Option<i64>,
  #[serde(default)]
  pub input_tokens: i64,
  #[serde(default)]
  pub output_tokens: i64,
  #[serde(default)]
  pub total_tokens: i64,
  #[serde(default)]
  pub payload: Option<Json<serde_json::Value>>,
  #[serde(default)]
  pub tool_usage: Option<Json<serde_json::Value>>,
  #[serde(default)]
  pub error_message: Option<String>,
  #[serde(default)]
  pub response_data: Option<Json<serde_json::Value>>,
}

impl Execution {
  pub fn new(
    id: impl Into<String>,
    workflow_id: impl Into<String>,
    overall_status: ExecutionStatus,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id: id.into(),
      workflow_id: workflow_id.into(),
      overall_status,
      created_at,
      updated_at: None,
      completed_at: None,
      total_latency_ms: None,
      input_tokens: 0,
      output_tokens: 0,
      total_tokens: 0,
      payload: None,
      tool_usage: None,
      error_message: None,
      response_data: None,
    }
  }

  pub fn with_latency(mut self, latency_ms: i64) -> Self {
    self.total_latency_ms = Some(latency_ms);
    self
  }

  /// Set input and output tokens; the total is their sum.
  pub fn with_tokens(mut self, input_tokens: i64, output_tokens: i64) -> Self {
    self.input_tokens = input_tokens;
    self.output_tokens = output_tokens;
    self.total_tokens = input_tokens + output_tokens;
    self
  }

  pub fn with_error(mut self, message: impl Into<String>) -> Self {
    self.error_message = Some(message.into());
    self
  }
}

impl AsRef<Execution> for Execution {
  fn as_ref(&self) -> &Execution {
    self
  }
}

/// A single step of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Step {
  pub id: String,
  pub execution_id: String,
  pub step_name: String,
  pub step_order: i64,
  #[serde(default)]
  pub status: Option<StepStatus>,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub latency_ms: Option<i64>,
  #[serde(default)]
  pub input_tokens: i64,
  #[serde(default)]
  pub output_tokens: i64,
  #[serde(default)]
  pub model_name: Option<String>,
  #[serde(default)]
  pub error_message: Option<String>,
  #[serde(default)]
  pub response_data: Option<Json<serde_json::Value>>,
}

impl Step {
  pub fn new(
    id: impl Into<String>,
    execution_id: impl Into<String>,
    step_name: impl Into<String>,
    step_order: i64,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id: id.into(),
      execution_id: execution_id.into(),
      step_name: step_name.into(),
      step_order,
      status: None,
      created_at,
      completed_at: None,
      latency_ms: None,
      input_tokens: 0,
      output_tokens: 0,
      model_name: None,
      error_message: None,
      response_data: None,
    }
  }

  pub fn with_status(mut self, status: StepStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_latency(mut self, latency_ms: i64) -> Self {
    self.latency_ms = Some(latency_ms);
    self
  }

  pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
    self.model_name = Some(model_name.into());
    self
  }

  pub fn with_tokens(mut self, input_tokens: i64, output_tokens: i64) -> Self {
    self.input_tokens = input_tokens;
    self.output_tokens = output_tokens;
    self
  }

  /// Input plus output tokens.
  pub fn total_tokens(&self) -> i64 {
    self.input_tokens + self.output_tokens
  }
}

impl AsRef<Step> for Step {
  fn as_ref(&self) -> &Step {
    self
  }
}

/// A queue entry referencing an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QueueEntry {
  pub id: String,
  #[serde(default)]
  pub workflow_execution_id: Option<String>,
  pub status: QueueStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
  pub fn new(
    id: impl Into<String>,
    workflow_execution_id: Option<&str>,
    status: QueueStatus,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id: id.into(),
      workflow_execution_id: workflow_execution_id.map(str::to_string),
      status,
      created_at,
      updated_at: None,
    }
  }
}

/// The three flat collections returned by one fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
  #[serde(default)]
  pub executions: Vec<Execution>,
  #[serde(default)]
  pub steps: Vec<Step>,
  #[serde(default)]
  pub queue: Vec<QueueEntry>,
}

impl RecordSet {
  pub fn is_empty(&self) -> bool {
    self.executions.is_empty() && self.steps.is_empty() && self.queue.is_empty()
  }
}

/// A single execution with its steps in `step_order`, as shown by the drilldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
  pub execution: Execution,
  pub steps: Vec<Step>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_labels() {
    assert_eq!(ExecutionStatus::Cancelled.label(), "Cancelled");
    assert_eq!(StepStatus::Running.label(), "Running");
    assert_eq!(QueueStatus::Updated.label(), "Updated");
  }

  #[test]
  fn test_status_from_str() {
    assert_eq!("failed".parse::<ExecutionStatus>(), Ok(ExecutionStatus::Failed));
    assert_eq!(
      "done".parse::<ExecutionStatus>(),
      Err(ParseStatusError("done".to_string()))
    );
  }

  #[test]
  fn test_execution_defaults_when_tokens_absent() {
    let execution: Execution = serde_json::from_str(
      r#"{
        "id": "exec-1",
        "workflow_id": "wf",
        "overall_status": "running",
        "created_at": "2024-05-01T10:00:00Z"
      }"#,
    )
    .unwrap();

    assert_eq!(execution.total_latency_ms, None);
    assert_eq!(execution.input_tokens, 0);
    assert_eq!(execution.total_tokens, 0);
    assert_eq!(execution.overall_status, ExecutionStatus::Running);
  }
}
