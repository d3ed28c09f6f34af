//! Serializable view models for the three dashboard tabs.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use prism_analytics::metrics::{
  ErrorRateBand, ExecutionSummary, ModelUsage, StatusSlice, StepLatency, StepStatusCount,
  TrendPoint,
};
use prism_analytics::{
  CompositeExecution, PageCursor, PageInfo, all_steps, execution_trend, latency_by_step,
  model_usage, status_distribution, step_status_distribution, summarize,
};
use prism_store::{
  ExecutionStatus, ExecutionTrace, QueueStatus, RecordStore, Step, StepStatus,
  contains_ignore_case,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::DashboardError;
use crate::navigation::Navigator;

/// One row of the executions table and the drilldown list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRow {
  pub workflow_id: String,
  pub id: String,
  pub status: ExecutionStatus,
  /// Status of the first queue entry, if any.
  pub queue_status: Option<QueueStatus>,
  pub created_at: DateTime<Utc>,
  /// 0 when no latency was recorded.
  pub latency_ms: i64,
  pub total_tokens: i64,
}

impl From<&CompositeExecution> for ExecutionRow {
  fn from(record: &CompositeExecution) -> Self {
    let execution = &record.execution;
    Self {
      workflow_id: execution.workflow_id.clone(),
      id: execution.id.clone(),
      status: execution.overall_status,
      queue_status: record.current_queue_status(),
      created_at: execution.created_at,
      latency_ms: execution.total_latency_ms.unwrap_or(0),
      total_tokens: execution.total_tokens,
    }
  }
}

/// One row of the steps table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRow {
  pub execution_id: String,
  pub step_name: String,
  pub step_order: i64,
  pub status: Option<StepStatus>,
  pub model_name: Option<String>,
  pub latency_ms: i64,
  pub input_tokens: i64,
  pub output_tokens: i64,
  pub total_tokens: i64,
  pub created_at: DateTime<Utc>,
}

impl From<&Step> for StepRow {
  fn from(step: &Step) -> Self {
    Self {
      execution_id: step.execution_id.clone(),
      step_name: step.step_name.clone(),
      step_order: step.step_order,
      status: step.status,
      model_name: step.model_name.clone(),
      latency_ms: step.latency_ms.unwrap_or(0),
      input_tokens: step.input_tokens,
      output_tokens: step.output_tokens,
      total_tokens: step.total_tokens(),
      created_at: step.created_at,
    }
  }
}

/// The overview tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
  pub summary: ExecutionSummary,
  /// Error rate rounded to one decimal, as shown on the card.
  pub error_rate: f64,
  pub error_rate_band: ErrorRateBand,
  pub status_distribution: Vec<StatusSlice>,
  pub trend: Vec<TrendPoint>,
  pub executions: Vec<ExecutionRow>,
  pub page: PageInfo,
}

/// Build the overview tab with the trend window ending on `today` in `tz`.
pub fn overview<Tz: TimeZone>(
  records: &[CompositeExecution],
  cursor: &mut PageCursor,
  today: NaiveDate,
  tz: &Tz,
) -> Overview {
  let summary = summarize(records);
  let executions = cursor.slice(records).iter().map(ExecutionRow::from).collect();

  Overview {
    error_rate: summary.error_rate_rounded(),
    error_rate_band: summary.error_rate_band(),
    summary,
    status_distribution: status_distribution(records),
    trend: execution_trend(records, today, tz),
    executions,
    page: cursor.info(),
  }
}

/// [`overview`] for today in the local time zone.
pub fn overview_local(records: &[CompositeExecution], cursor: &mut PageCursor) -> Overview {
  overview(records, cursor, Local::now().date_naive(), &Local)
}

/// The steps analysis tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepsAnalysis {
  pub latency_by_step: Vec<StepLatency>,
  pub status_distribution: Vec<StepStatusCount>,
  pub model_usage: Vec<ModelUsage>,
  /// Most recent first.
  pub steps: Vec<StepRow>,
  pub total_steps: usize,
  pub page: PageInfo,
}

pub fn steps_analysis(records: &[CompositeExecution], cursor: &mut PageCursor) -> StepsAnalysis {
  let steps = all_steps(records);

  let mut recent = steps.clone();
  recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  let rows = cursor
    .slice(&recent)
    .iter()
    .map(|step| StepRow::from(*step))
    .collect();

  StepsAnalysis {
    latency_by_step: latency_by_step(&steps),
    status_distribution: step_status_distribution(&steps),
    model_usage: model_usage(&steps),
    steps: rows,
    total_steps: steps.len(),
    page: cursor.info(),
  }
}

/// The drilldown tab: a searchable list, or one execution's trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Drilldown {
  List {
    search: String,
    /// Number of matching executions before the limit is applied.
    matches: usize,
    executions: Vec<ExecutionRow>,
  },
  Detail {
    fragment: String,
    execution: ExecutionTrace,
  },
}

/// Executions whose workflow id or id contains `search`, ignoring case,
/// capped at `limit`.
pub fn drilldown_list(records: &[CompositeExecution], search: &str, limit: usize) -> Drilldown {
  let matching: Vec<&CompositeExecution> = records
    .iter()
    .filter(|r| {
      contains_ignore_case(&r.execution.workflow_id, search)
        || contains_ignore_case(&r.execution.id, search)
    })
    .collect();

  Drilldown::List {
    search: search.to_string(),
    matches: matching.len(),
    executions: matching
      .into_iter()
      .take(limit)
      .map(ExecutionRow::from)
      .collect(),
  }
}

/// Fetch one execution by exact id, ignoring the active filter.
#[instrument(skip(store))]
pub async fn drilldown_detail<S: RecordStore>(
  store: &S,
  execution_id: &str,
) -> Result<ExecutionTrace, DashboardError> {
  let trace = store.fetch_execution(execution_id).await?;
  debug!(steps = trace.steps.len(), "fetched execution trace");
  Ok(trace)
}

/// The drilldown for the navigator's current selection.
pub async fn drilldown<S: RecordStore>(
  store: &S,
  records: &[CompositeExecution],
  navigator: &Navigator,
  search: &str,
  limit: usize,
) -> Result<Drilldown, DashboardError> {
  match navigator.selection() {
    Some(execution_id) => Ok(Drilldown::Detail {
      fragment: navigator.fragment(),
      execution: drilldown_detail(store, execution_id).await?,
    }),
    None => Ok(drilldown_list(records, search, limit)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use prism_analytics::join;
  use prism_store::{Execution, MemoryStore, QueueEntry, RecordSet};

  fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
  }

  fn record_set() -> RecordSet {
    RecordSet {
      executions: vec![
        Execution::new("exec-003", "Billing", ExecutionStatus::Failed, at("2024-05-03T10:00:00Z"))
          .with_latency(400)
          .with_tokens(10, 5),
        Execution::new("exec-002", "reports", ExecutionStatus::Success, at("2024-05-02T10:00:00Z")),
        Execution::new("exec-001", "billing-eu", ExecutionStatus::Success, at("2024-05-01T10:00:00Z"))
          .with_latency(200),
      ],
      steps: vec![
        Step::new("s-1", "exec-003", "fetch", 1, at("2024-05-03T10:00:01Z")).with_latency(50),
        Step::new("s-2", "exec-003", "render", 2, at("2024-05-03T10:00:02Z"))
          .with_status(StepStatus::Failed)
          .with_model("gpt-4o"),
        Step::new("s-3", "exec-001", "fetch", 1, at("2024-05-01T10:00:01Z"))
          .with_status(StepStatus::Success)
          .with_latency(70),
      ],
      queue: vec![QueueEntry::new(
        "q-1",
        Some("exec-003"),
        QueueStatus::Failed,
        at("2024-05-03T10:00:00Z"),
      )],
    }
  }

  fn records() -> Vec<CompositeExecution> {
    join(record_set()).unwrap()
  }

  #[test]
  fn test_overview_rows_and_cards() {
    let records = records();
    let mut cursor = PageCursor::new(2);
    let today = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();

    let view = overview(&records, &mut cursor, today, &Utc);

    assert_eq!(view.summary.total, 3);
    assert_eq!(view.error_rate, 33.3);
    assert_eq!(view.error_rate_band, ErrorRateBand::Critical);
    assert_eq!(view.trend.len(), 30);
    assert_eq!(view.trend.last().map(|p| p.total), Some(1));
    assert_eq!(view.page.total_pages, 2);

    let first = &view.executions[0];
    assert_eq!(first.queue_status, Some(QueueStatus::Failed));
    assert_eq!(first.total_tokens, 15);
    assert_eq!(view.executions[1].latency_ms, 0);
    assert_eq!(view.executions[1].queue_status, None);
  }

  #[test]
  fn test_overview_second_page() {
    let records = records();
    let mut cursor = PageCursor::new(2);
    cursor.observe(records.len());
    cursor.next();

    let view = overview(&records, &mut cursor, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(), &Utc);
    let ids: Vec<_> = view.executions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["exec-001"]);
    assert_eq!(view.page.page, 2);
  }

  #[test]
  fn test_steps_analysis_orders_by_created_at_desc() {
    let records = records();
    let mut cursor = PageCursor::new(100);

    let view = steps_analysis(&records, &mut cursor);

    assert_eq!(view.total_steps, 3);
    let names: Vec<_> = view.steps.iter().map(|s| s.step_name.as_str()).collect();
    assert_eq!(names, vec!["render", "fetch", "fetch"]);
    assert_eq!(view.steps[0].latency_ms, 0);
    assert_eq!(view.latency_by_step[0].step_name, "fetch");
    assert_eq!(view.latency_by_step[0].avg_latency_ms, 60);
    assert_eq!(view.model_usage[0].model, "gpt-4o");
    assert_eq!(view.status_distribution.len(), 2);
    assert_eq!(view.status_distribution[0].percentage, 50.0);
  }

  #[test]
  fn test_drilldown_list_search() {
    let records = records();
    match drilldown_list(&records, "BILL", 1) {
      Drilldown::List {
        matches,
        executions,
        ..
      } => {
        assert_eq!(matches, 2);
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].id, "exec-003");
      }
      other => panic!("expected list, got {other:?}"),
    }

    match drilldown_list(&records, "002", 50) {
      Drilldown::List { executions, .. } => assert_eq!(executions[0].workflow_id, "reports"),
      other => panic!("expected list, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_drilldown_detail_ignores_filter() {
    let store = MemoryStore::new(record_set());
    let mut nav = Navigator::new();
    nav.select("exec-003");

    // The current records hold nothing; the detail still resolves by id.
    let view = drilldown(&store, &[], &nav, "", 50).await.unwrap();
    match view {
      Drilldown::Detail {
        fragment,
        execution,
      } => {
        assert_eq!(fragment, "#execution-exec-003");
        let order: Vec<_> = execution.steps.iter().map(|s| s.step_order).collect();
        assert_eq!(order, vec![1, 2]);
      }
      other => panic!("expected detail, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_drilldown_detail_not_found() {
    let store = MemoryStore::new(record_set());
    let err = drilldown_detail(&store, "exec-999").await.unwrap_err();
    assert!(matches!(
      err,
      DashboardError::Store(prism_store::Error::NotFound(_))
    ));
  }

  #[test]
  fn test_trend_window_counts_recent_day() {
    let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
    let created = (today - Duration::days(5)).and_hms_opt(12, 0, 0).unwrap().and_utc();
    let records = join(RecordSet {
      executions: vec![Execution::new("e", "wf", ExecutionStatus::Success, created)],
      ..RecordSet::default()
    })
    .unwrap();

    let view = overview(&records, &mut PageCursor::new(50), today, &Utc);
    let counts: Vec<_> = view.trend.iter().map(|p| p.total).collect();
    assert_eq!(counts.iter().sum::<usize>(), 1);
    assert_eq!(counts[30 - 1 - 5], 1);
  }
}
