//! Search criteria for a fetch cycle.
//!
//! A [`Filter`] is what the user selected. [`FilterParams`] is its translation
//! into predicate parameters a record store can apply: LIKE patterns for the
//! substring fields and UTC instants for the calendar-day bounds.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Execution, ExecutionStatus};

/// Milliseconds from 00:00:00.000 to 23:59:59.999.
const END_OF_DAY_MS: i64 = 86_399_999;

/// User-selected search criteria. Every field is optional; an empty filter
/// matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
  /// Case-insensitive substring of the workflow id.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_id: Option<String>,
  /// Case-insensitive substring of the execution id.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub execution_id: Option<String>,
  /// Exact overall status.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub overall_status: Option<ExecutionStatus>,
  /// First calendar day (inclusive, local time).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  /// Last calendar day (inclusive, local time).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_date: Option<NaiveDate>,
}

/// Predicate parameters derived from a [`Filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams {
  /// Lower-cased `%substring%` pattern, LIKE wildcards escaped with `\`.
  pub workflow_pattern: Option<String>,
  pub execution_pattern: Option<String>,
  pub overall_status: Option<ExecutionStatus>,
  /// `created_at >= created_from`
  pub created_from: Option<DateTime<Utc>>,
  /// `created_at <= created_to`
  pub created_to: Option<DateTime<Utc>>,
}

impl Filter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self == &Self::default()
  }

  /// Reset every field.
  pub fn clear(&mut self) {
    *self = Self::default();
  }

  pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
    self.workflow_id = non_blank(workflow_id.into());
    self
  }

  pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
    self.execution_id = non_blank(execution_id.into());
    self
  }

  pub fn with_status(mut self, status: ExecutionStatus) -> Self {
    self.overall_status = Some(status);
    self
  }

  pub fn with_start_date(mut self, date: NaiveDate) -> Self {
    self.start_date = Some(date);
    self
  }

  pub fn with_end_date(mut self, date: NaiveDate) -> Self {
    self.end_date = Some(date);
    self
  }

  /// Predicate parameters with day bounds resolved in the local time zone.
  pub fn params(&self) -> FilterParams {
    self.params_in(&Local)
  }

  /// Predicate parameters with day bounds resolved in `tz`.
  pub fn params_in<Tz: TimeZone>(&self, tz: &Tz) -> FilterParams {
    FilterParams {
      workflow_pattern: self.workflow_id.as_deref().map(like_pattern),
      execution_pattern: self.execution_id.as_deref().map(like_pattern),
      overall_status: self.overall_status,
      created_from: self.start_date.map(|date| start_of_day(date, tz)),
      created_to: self.end_date.map(|date| end_of_day(date, tz)),
    }
  }

  /// Evaluate the filter against a single execution in the local time zone.
  pub fn matches(&self, execution: &Execution) -> bool {
    self.matches_in(execution, &Local)
  }

  /// Evaluate the filter against a single execution, resolving day bounds in `tz`.
  pub fn matches_in<Tz: TimeZone>(&self, execution: &Execution, tz: &Tz) -> bool {
    if let Some(needle) = &self.workflow_id {
      if !contains_ignore_case(&execution.workflow_id, needle) {
        return false;
      }
    }
    if let Some(needle) = &self.execution_id {
      if !contains_ignore_case(&execution.id, needle) {
        return false;
      }
    }
    if let Some(status) = self.overall_status {
      if execution.overall_status != status {
        return false;
      }
    }
    if let Some(date) = self.start_date {
      if execution.created_at < start_of_day(date, tz) {
        return false;
      }
    }
    if let Some(date) = self.end_date {
      if execution.created_at > end_of_day(date, tz) {
        return false;
      }
    }
    true
  }
}

fn non_blank(value: String) -> Option<String> {
  if value.is_empty() { None } else { Some(value) }
}

/// Case-insensitive substring test shared by the filter and the drilldown search.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
  haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn like_pattern(value: &str) -> String {
  let mut pattern = String::with_capacity(value.len() + 2);
  pattern.push('%');
  for c in value.to_lowercase().chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
  to_utc(date.and_time(NaiveTime::MIN), tz)
}

fn end_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
  to_utc(
    date.and_time(NaiveTime::MIN) + Duration::milliseconds(END_OF_DAY_MS),
    tz,
  )
}

/// Resolve a wall-clock time in `tz`. Ambiguous times take the earliest
/// instant; times skipped by a DST gap are read as UTC.
fn to_utc<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
  tz.from_local_datetime(&naive)
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or_else(|| naive.and_utc())
}
