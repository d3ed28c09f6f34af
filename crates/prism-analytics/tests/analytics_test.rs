//! End-to-end checks over a realistic record set.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use prism_analytics::{
  CompositeExecution, all_steps, execution_trend, flatten, join, latency_by_step, paginate,
  status_distribution, summarize, total_pages,
};
use prism_store::{
  Execution, ExecutionStatus, Filter, QueueEntry, QueueStatus, RecordSet, Step, StepStatus,
};

fn at(s: &str) -> DateTime<Utc> {
  s.parse().unwrap()
}

fn records() -> RecordSet {
  let executions = vec![
    Execution::new("e-3", "billing", ExecutionStatus::Failed, at("2024-03-07T12:00:00Z"))
      .with_latency(900)
      .with_tokens(30, 10),
    Execution::new("e-2", "Billing-Nightly", ExecutionStatus::Success, at("2024-03-06T12:00:00Z"))
      .with_latency(300)
      .with_tokens(20, 5),
    Execution::new("e-1", "reports", ExecutionStatus::Running, at("2024-03-05T12:00:00Z")),
  ];
  let steps = vec![
    Step::new("s-1", "e-3", "fetch", 1, at("2024-03-07T12:00:01Z"))
      .with_status(StepStatus::Success)
      .with_latency(100),
    Step::new("s-2", "e-3", "summarize", 2, at("2024-03-07T12:00:02Z"))
      .with_status(StepStatus::Failed)
      .with_latency(800)
      .with_model("claude-3"),
    Step::new("s-3", "e-2", "fetch", 1, at("2024-03-06T12:00:01Z"))
      .with_status(StepStatus::Success)
      .with_latency(300),
  ];
  let queue = vec![QueueEntry::new(
    "q-1",
    Some("e-3"),
    QueueStatus::Failed,
    at("2024-03-07T12:00:00Z"),
  )];
  RecordSet {
    executions,
    steps,
    queue,
  }
}

fn sorted_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
  let mut ids: Vec<_> = ids.into_iter().collect();
  ids.sort_unstable();
  ids
}

#[test]
fn test_flatten_after_join_preserves_records() {
  let original = records();
  let joined = join(original.clone()).unwrap();
  let flat = flatten(&joined);

  assert_eq!(flat.executions, original.executions);
  assert_eq!(
    sorted_ids(flat.steps.iter().map(|s| s.id.as_str())),
    sorted_ids(original.steps.iter().map(|s| s.id.as_str()))
  );
  assert_eq!(flat.queue, original.queue);
}

#[test]
fn test_empty_filter_keeps_every_execution() {
  let original = records();
  let filter = Filter::new();
  let kept: Vec<&Execution> = original
    .executions
    .iter()
    .filter(|e| filter.matches(e))
    .collect();
  assert_eq!(kept.len(), original.executions.len());
}

#[test]
fn test_dashboard_metrics() {
  let joined = join(records()).unwrap();
  let summary = summarize(&joined);

  assert_eq!(summary.total, 3);
  assert_eq!(summary.failed, 1);
  assert!((0.0..=100.0).contains(&summary.error_rate));
  assert_eq!(summary.error_rate_rounded(), 33.3);
  assert_eq!(summary.avg_latency_ms, 600.0);
  assert_eq!(summary.p95_latency_ms, 900);
  assert_eq!(summary.total_tokens, 65);

  let statuses: Vec<_> = status_distribution(&joined)
    .into_iter()
    .map(|slice| slice.label)
    .collect();
  assert_eq!(statuses, vec!["Failed", "Success", "Running"]);

  let latencies = latency_by_step(&all_steps(&joined));
  assert_eq!(latencies[0].step_name, "summarize");
  assert_eq!(latencies[1].avg_latency_ms, 200);
}

#[test]
fn test_trend_serializes_dates() {
  let joined: Vec<CompositeExecution> = join(records()).unwrap();
  let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
  let trend = execution_trend(&joined, today, &Utc);

  let last = trend.last().unwrap();
  assert_eq!(last.total, 1);
  assert_eq!(last.failed, 1);

  let json = serde_json::to_value(last).unwrap();
  assert_eq!(json["date"], "2024-03-07");
  assert_eq!(json["label"], "Mar 07");

  let two_days_ago = &trend[trend.len() - 3];
  assert_eq!(two_days_ago.date, today - Duration::days(2));
  assert_eq!(two_days_ago.total, 1);
  assert_eq!(two_days_ago.success, 0);
}

#[test]
fn test_pages_cover_joined_records() {
  let joined = join(records()).unwrap();
  let size = 2;
  let pages = total_pages(joined.len(), size);
  assert_eq!(pages, 2);

  let ids: Vec<&str> = (1..=pages)
    .flat_map(|page| paginate(&joined, page, size))
    .map(|record| record.execution.id.as_str())
    .collect();
  assert_eq!(ids, vec!["e-3", "e-2", "e-1"]);
}
