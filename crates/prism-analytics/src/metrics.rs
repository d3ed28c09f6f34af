//! Statistics over joined executions and flattened steps.
//!
//! Every function here is pure: it reads the slice it is given and returns a
//! freshly built value. Callers decide which record set to pass in.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Duration, NaiveDate, TimeZone};
use prism_store::{Execution, ExecutionStatus, Step, StepStatus};
use serde::Serialize;

/// Quantile reported as `p95_latency_ms`.
pub const P95: f64 = 0.95;

/// Number of step names kept by [`latency_by_step`].
pub const TOP_STEP_LATENCIES: usize = 10;

/// Number of models kept by [`model_usage`].
pub const TOP_MODELS: usize = 8;

/// Length of the [`execution_trend`] series in days.
pub const TREND_WINDOW_DAYS: usize = 30;

/// Slices below this share get no in-chart label.
pub const LABEL_MIN_PERCENTAGE: f64 = 5.0;

/// Scalar metrics over a set of executions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
  pub total: usize,
  pub failed: usize,
  /// `100 × failed / total`, 0 for an empty set.
  pub error_rate: f64,
  /// Mean over executions with a positive latency.
  pub avg_latency_ms: f64,
  /// Nearest-rank 95th percentile over the same restricted set.
  pub p95_latency_ms: i64,
  /// Size of the restricted latency set.
  pub latency_sample_size: usize,
  pub total_input_tokens: i64,
  pub total_output_tokens: i64,
  pub total_tokens: i64,
}

/// Severity band of an error rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorRateBand {
  /// At most 5 %.
  Healthy,
  /// Above 5 %, at most 10 %.
  Elevated,
  /// Above 10 %.
  Critical,
}

impl ExecutionSummary {
  /// Error rate rounded to one decimal.
  pub fn error_rate_rounded(&self) -> f64 {
    round_to(self.error_rate, 1)
  }

  pub fn error_rate_band(&self) -> ErrorRateBand {
    if self.error_rate > 10.0 {
      ErrorRateBand::Critical
    } else if self.error_rate > 5.0 {
      ErrorRateBand::Elevated
    } else {
      ErrorRateBand::Healthy
    }
  }
}

/// One slice of the execution status distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSlice {
  pub status: ExecutionStatus,
  pub label: String,
  pub count: usize,
  /// Share of all executions, rounded to one decimal.
  pub percentage: f64,
  /// Whether the slice carries an in-chart label.
  pub show_label: bool,
}

/// Average latency of one step name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepLatency {
  pub step_name: String,
  /// Rounded to the nearest millisecond.
  pub avg_latency_ms: i64,
  pub samples: usize,
}

/// Number of steps that used a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelUsage {
  pub model: String,
  pub count: usize,
}

/// One slice of the step status distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStatusCount {
  pub status: StepStatus,
  pub label: String,
  pub count: usize,
  /// Share of steps with a status, rounded to a whole number.
  pub percentage: f64,
}

/// Execution counts for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
  /// Serialized as `YYYY-MM-DD`.
  pub date: NaiveDate,
  /// Axis label, e.g. `Mar 07`.
  pub label: String,
  pub total: usize,
  pub success: usize,
  pub failed: usize,
}

/// Count, rate, latency and token metrics.
pub fn summarize<E: AsRef<Execution>>(executions: &[E]) -> ExecutionSummary {
  let executions: Vec<&Execution> = executions.iter().map(|e| e.as_ref()).collect();
  let total = executions.len();
  let failed = executions
    .iter()
    .filter(|e| e.overall_status == ExecutionStatus::Failed)
    .count();

  let mut latencies: Vec<i64> = executions
    .iter()
    .filter_map(|e| e.total_latency_ms)
    .filter(|&ms| ms > 0)
    .collect();
  latencies.sort_unstable();

  let avg_latency_ms = if latencies.is_empty() {
    0.0
  } else {
    latencies.iter().sum::<i64>() as f64 / latencies.len() as f64
  };

  ExecutionSummary {
    total,
    failed,
    error_rate: percentage(failed, total),
    avg_latency_ms,
    p95_latency_ms: nearest_rank(&latencies, P95),
    latency_sample_size: latencies.len(),
    total_input_tokens: executions.iter().map(|e| e.input_tokens).sum(),
    total_output_tokens: executions.iter().map(|e| e.output_tokens).sum(),
    total_tokens: executions.iter().map(|e| e.total_tokens).sum(),
  }
}

/// Value at index `floor(quantile × n)` of an ascending slice, or 0 when the
/// index falls outside it. Not interpolated.
pub fn nearest_rank(sorted: &[i64], quantile: f64) -> i64 {
  let index = (sorted.len() as f64 * quantile).floor() as usize;
  sorted.get(index).copied().unwrap_or(0)
}

/// Executions grouped by overall status, in first-seen order.
pub fn status_distribution<E: AsRef<Execution>>(executions: &[E]) -> Vec<StatusSlice> {
  let total = executions.len();
  count_first_seen(executions.iter().map(|e| e.as_ref().overall_status))
    .into_iter()
    .map(|(status, count)| {
      let percentage = round_to(percentage(count, total), 1);
      StatusSlice {
        status,
        label: status.label(),
        count,
        percentage,
        show_label: percentage >= LABEL_MIN_PERCENTAGE,
      }
    })
    .collect()
}

/// Average positive latency per step name, slowest first, top
/// [`TOP_STEP_LATENCIES`].
pub fn latency_by_step<S: AsRef<Step>>(steps: &[S]) -> Vec<StepLatency> {
  let mut index: HashMap<&str, usize> = HashMap::new();
  let mut groups: Vec<(&str, i64, usize)> = Vec::new();

  for step in steps {
    let step: &Step = step.as_ref();
    let Some(latency) = step.latency_ms.filter(|&ms| ms > 0) else {
      continue;
    };
    match index.get(step.step_name.as_str()) {
      Some(&i) => {
        groups[i].1 += latency;
        groups[i].2 += 1;
      }
      None => {
        index.insert(step.step_name.as_str(), groups.len());
        groups.push((step.step_name.as_str(), latency, 1));
      }
    }
  }

  let mut result: Vec<StepLatency> = groups
    .into_iter()
    .map(|(step_name, sum, samples)| StepLatency {
      step_name: step_name.to_string(),
      avg_latency_ms: (sum as f64 / samples as f64).round() as i64,
      samples,
    })
    .collect();
  result.sort_by(|a, b| b.avg_latency_ms.cmp(&a.avg_latency_ms));
  result.truncate(TOP_STEP_LATENCIES);
  result
}

/// Steps per non-blank model name, most used first, top [`TOP_MODELS`].
pub fn model_usage<S: AsRef<Step>>(steps: &[S]) -> Vec<ModelUsage> {
  let models = steps
    .iter()
    .filter_map(|s| s.as_ref().model_name.as_deref())
    .filter(|name| !name.trim().is_empty());

  let mut result: Vec<ModelUsage> = count_first_seen(models)
    .into_iter()
    .map(|(model, count)| ModelUsage {
      model: model.to_string(),
      count,
    })
    .collect();
  result.sort_by(|a, b| b.count.cmp(&a.count));
  result.truncate(TOP_MODELS);
  result
}

/// Steps grouped by status, in first-seen order. Steps without a status are
/// not counted.
pub fn step_status_distribution<S: AsRef<Step>>(steps: &[S]) -> Vec<StepStatusCount> {
  let counts = count_first_seen(steps.iter().filter_map(|s| s.as_ref().status));
  let total: usize = counts.iter().map(|(_, count)| count).sum();

  counts
    .into_iter()
    .map(|(status, count)| StepStatusCount {
      status,
      label: status.label(),
      count,
      percentage: round_to(percentage(count, total), 0),
    })
    .collect()
}

/// Daily counts for the [`TREND_WINDOW_DAYS`] days ending on `today`, oldest
/// first. Days are calendar dates of `created_at` in `tz`; executions outside
/// the window are ignored.
pub fn execution_trend<E, Tz>(executions: &[E], today: NaiveDate, tz: &Tz) -> Vec<TrendPoint>
where
  E: AsRef<Execution>,
  Tz: TimeZone,
{
  let start = today - Duration::days(TREND_WINDOW_DAYS as i64 - 1);

  let mut points: Vec<TrendPoint> = (0..TREND_WINDOW_DAYS)
    .map(|offset| {
      let date = start + Duration::days(offset as i64);
      TrendPoint {
        date,
        label: date.format("%b %d").to_string(),
        total: 0,
        success: 0,
        failed: 0,
      }
    })
    .collect();

  for execution in executions {
    let execution: &Execution = execution.as_ref();
    let day = execution.created_at.with_timezone(tz).date_naive();
    let offset = (day - start).num_days();
    let Some(point) = usize::try_from(offset)
      .ok()
      .and_then(|offset| points.get_mut(offset))
    else {
      continue;
    };

    point.total += 1;
    match execution.overall_status {
      ExecutionStatus::Success => point.success += 1,
      ExecutionStatus::Failed => point.failed += 1,
      _ => {}
    }
  }

  points
}

fn percentage(count: usize, total: usize) -> f64 {
  if total == 0 {
    0.0
  } else {
    100.0 * count as f64 / total as f64
  }
}

fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}

fn count_first_seen<K: Eq + Hash + Copy>(keys: impl IntoIterator<Item = K>) -> Vec<(K, usize)> {
  let mut index: HashMap<K, usize> = HashMap::new();
  let mut counts: Vec<(K, usize)> = Vec::new();
  for key in keys {
    match index.get(&key) {
      Some(&i) => counts[i].1 += 1,
      None => {
        index.insert(key, counts.len());
        counts.push((key, 1));
      }
    }
  }
  counts
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{DateTime, FixedOffset, Utc};

  fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
  }

  fn execution(id: &str, status: ExecutionStatus, latency: Option<i64>) -> Execution {
    let execution = Execution::new(id, "wf", status, at("2024-01-01T00:00:00Z"));
    match latency {
      Some(ms) => execution.with_latency(ms),
      None => execution,
    }
  }

  fn step(name: &str, latency: Option<i64>) -> Step {
    let step = Step::new(format!("{name}-step"), "e1", name, 1, at("2024-01-01T00:00:00Z"));
    match latency {
      Some(ms) => step.with_latency(ms),
      None => step,
    }
  }

  #[test]
  fn test_summary_example() {
    let executions = vec![
      execution("a", ExecutionStatus::Success, Some(100)),
      execution("b", ExecutionStatus::Failed, Some(200)),
      execution("c", ExecutionStatus::Success, None),
    ];

    let summary = summarize(&executions);

    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.error_rate_rounded(), 33.3);
    assert_eq!(summary.avg_latency_ms, 150.0);
    assert_eq!(summary.latency_sample_size, 2);
    assert_eq!(summary.p95_latency_ms, 200);
    assert_eq!(summary.error_rate_band(), ErrorRateBand::Critical);
  }

  #[test]
  fn test_summary_of_empty_set() {
    let summary = summarize::<Execution>(&[]);
    assert_eq!(summary.total, 0);
    assert_eq!(summary.error_rate, 0.0);
    assert_eq!(summary.avg_latency_ms, 0.0);
    assert_eq!(summary.p95_latency_ms, 0);
    assert_eq!(summary.error_rate_band(), ErrorRateBand::Healthy);
  }

  #[test]
  fn test_zero_latency_is_excluded() {
    let executions = vec![
      execution("a", ExecutionStatus::Success, Some(0)),
      execution("b", ExecutionStatus::Success, Some(300)),
    ];
    let summary = summarize(&executions);
    assert_eq!(summary.latency_sample_size, 1);
    assert_eq!(summary.avg_latency_ms, 300.0);
  }

  #[test]
  fn test_token_sums() {
    let executions = vec![
      execution("a", ExecutionStatus::Success, None).with_tokens(10, 5),
      execution("b", ExecutionStatus::Running, None),
      execution("c", ExecutionStatus::Success, None).with_tokens(1, 2),
    ];
    let summary = summarize(&executions);
    assert_eq!(summary.total_input_tokens, 11);
    assert_eq!(summary.total_output_tokens, 7);
    assert_eq!(summary.total_tokens, 18);
  }

  #[test]
  fn test_nearest_rank() {
    let values: Vec<i64> = (1..=20).collect();
    assert_eq!(nearest_rank(&values, P95), 20);
    assert_eq!(nearest_rank(&values[..10], P95), 10);
    assert_eq!(nearest_rank(&[42], P95), 42);
    assert_eq!(nearest_rank(&[], P95), 0);

    let values: Vec<i64> = (1..=100).collect();
    assert_eq!(nearest_rank(&values, P95), 96);
  }

  #[test]
  fn test_status_distribution_labels_and_threshold() {
    let mut executions: Vec<Execution> = (0..24)
      .map(|i| execution(&format!("s{i}"), ExecutionStatus::Success, None))
      .collect();
    executions.push(execution("f", ExecutionStatus::Failed, None));

    let slices = status_distribution(&executions);

    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].label, "Success");
    assert_eq!(slices[0].count, 24);
    assert_eq!(slices[0].percentage, 96.0);
    assert!(slices[0].show_label);
    assert_eq!(slices[1].label, "Failed");
    assert_eq!(slices[1].percentage, 4.0);
    assert!(!slices[1].show_label);
  }

  #[test]
  fn test_status_distribution_rounds_to_one_decimal() {
    let executions = vec![
      execution("a", ExecutionStatus::Pending, None),
      execution("b", ExecutionStatus::Cancelled, None),
      execution("c", ExecutionStatus::Cancelled, None),
    ];
    let slices = status_distribution(&executions);
    assert_eq!(slices[0].percentage, 33.3);
    assert_eq!(slices[1].percentage, 66.7);
    assert_eq!(slices[1].label, "Cancelled");
  }

  #[test]
  fn test_latency_by_step_example() {
    let steps: Vec<Step> = (10..=44).map(|ms| step("fetch", Some(ms))).collect();
    let result = latency_by_step(&steps);
    assert_eq!(
      result,
      vec![StepLatency {
        step_name: "fetch".to_string(),
        avg_latency_ms: 27,
        samples: 35,
      }]
    );
  }

  #[test]
  fn test_latency_by_step_sorts_and_truncates() {
    let mut steps: Vec<Step> = (0..12)
      .map(|i| step(&format!("step-{i}"), Some(100 + i)))
      .collect();
    steps.push(step("no-latency", None));
    steps.push(step("zero", Some(0)));

    let result = latency_by_step(&steps);

    assert_eq!(result.len(), TOP_STEP_LATENCIES);
    assert_eq!(result[0].step_name, "step-11");
    assert_eq!(result[9].step_name, "step-2");
    assert!(result.iter().all(|r| r.step_name != "zero"));
  }

  #[test]
  fn test_model_usage() {
    let mut steps = Vec::new();
    for (model, n) in [("gpt-4o", 2), ("claude", 3), ("   ", 4)] {
      for _ in 0..n {
        steps.push(step("call", None).with_model(model));
      }
    }
    steps.push(step("call", None));

    let usage = model_usage(&steps);
    assert_eq!(
      usage,
      vec![
        ModelUsage { model: "claude".to_string(), count: 3 },
        ModelUsage { model: "gpt-4o".to_string(), count: 2 },
      ]
    );
  }

  #[test]
  fn test_model_usage_keeps_top_eight() {
    let steps: Vec<Step> = (0..10)
      .map(|i| step("call", None).with_model(format!("model-{i}")))
      .collect();
    assert_eq!(model_usage(&steps).len(), TOP_MODELS);
  }

  #[test]
  fn test_step_status_distribution_skips_missing() {
    let steps = vec![
      step("a", None).with_status(StepStatus::Success),
      step("b", None).with_status(StepStatus::Failed),
      step("c", None).with_status(StepStatus::Success),
      step("d", None),
    ];
    let counts = step_status_distribution(&steps);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].status, StepStatus::Success);
    assert_eq!(counts[0].count, 2);
    assert_eq!(counts[0].percentage, 67.0);
    assert_eq!(counts[1].label, "Failed");
    assert_eq!(counts[1].percentage, 33.0);
  }

  #[test]
  fn test_trend_is_fixed_length_with_single_bucket() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
    let five_days_ago = Execution::new(
      "a",
      "wf",
      ExecutionStatus::Failed,
      at("2024-03-15T12:00:00Z"),
    );

    let trend = execution_trend(&[five_days_ago], today, &Utc);

    assert_eq!(trend.len(), TREND_WINDOW_DAYS);
    assert_eq!(trend[29].date, today);
    assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2024, 2, 20).unwrap());
    let bucket = &trend[29 - 5];
    assert_eq!(bucket.label, "Mar 15");
    assert_eq!((bucket.total, bucket.success, bucket.failed), (1, 0, 1));
    assert_eq!(trend.iter().map(|p| p.total).sum::<usize>(), 1);
  }

  #[test]
  fn test_trend_ignores_out_of_window_and_uses_time_zone() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
    let executions = vec![
      Execution::new("old", "wf", ExecutionStatus::Success, at("2024-01-01T12:00:00Z")),
      Execution::new("future", "wf", ExecutionStatus::Success, at("2024-03-21T12:00:00Z")),
      Execution::new("late", "wf", ExecutionStatus::Success, at("2024-03-19T23:30:00Z")),
    ];
    let tz = FixedOffset::east_opt(3600).unwrap();

    let trend = execution_trend(&executions, today, &tz);

    assert_eq!(trend.iter().map(|p| p.total).sum::<usize>(), 1);
    assert_eq!(trend[29].total, 1);
    assert_eq!(trend[29].success, 1);
  }

  #[test]
  fn test_metrics_do_not_depend_on_call_count() {
    let executions = vec![
      execution("a", ExecutionStatus::Success, Some(120)),
      execution("b", ExecutionStatus::Failed, Some(80)),
    ];
    assert_eq!(summarize(&executions), summarize(&executions));
    assert_eq!(status_distribution(&executions), status_distribution(&executions));
  }
}
