use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use prism_analytics::PageCursor;
use prism_dashboard::views::{drilldown, overview_local, steps_analysis};
use prism_dashboard::{DashboardConfig, DataSource, Navigator, Tab};
use prism_store::{ExecutionStatus, Filter, MemoryStore, RecordStore, SqliteStore};

/// Prism - Analytics over recorded workflow executions
#[derive(Parser)]
#[command(name = "prism")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Database URL, e.g. sqlite://runs.db (overrides the config file)
  #[arg(long)]
  database: Option<String>,

  /// Path to the config file (default: ~/.prism/config.json)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Read records from a JSON dump instead of a database
  #[arg(long, conflicts_with = "database")]
  records: Option<PathBuf>,

  #[command(flatten)]
  filter: FilterArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct FilterArgs {
  /// Case-insensitive substring of the workflow id
  #[arg(long)]
  workflow_id: Option<String>,

  /// Case-insensitive substring of the execution id
  #[arg(long)]
  execution_id: Option<String>,

  /// Overall status (success, failed, running, pending, cancelled)
  #[arg(long)]
  status: Option<ExecutionStatus>,

  /// First day to include (YYYY-MM-DD, local time)
  #[arg(long)]
  start_date: Option<NaiveDate>,

  /// Last day to include (YYYY-MM-DD, local time)
  #[arg(long)]
  end_date: Option<NaiveDate>,
}

impl FilterArgs {
  fn into_filter(self) -> Filter {
    let mut filter = Filter::new();
    if let Some(workflow_id) = self.workflow_id {
      filter = filter.with_workflow_id(workflow_id);
    }
    if let Some(execution_id) = self.execution_id {
      filter = filter.with_execution_id(execution_id);
    }
    if let Some(status) = self.status {
      filter = filter.with_status(status);
    }
    if let Some(date) = self.start_date {
      filter = filter.with_start_date(date);
    }
    if let Some(date) = self.end_date {
      filter = filter.with_end_date(date);
    }
    filter
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Summary cards, status distribution, trend and the executions table
  Overview {
    /// Page of the executions table
    #[arg(long, default_value_t = 1)]
    page: usize,
  },

  /// Step latency, status and model usage, and the steps table
  Steps {
    /// Page of the steps table
    #[arg(long, default_value_t = 1)]
    page: usize,
  },

  /// Search executions, or show one execution's trace
  Drilldown {
    /// Execution to show
    #[arg(long, conflicts_with = "fragment")]
    execution: Option<String>,

    /// Location fragment, e.g. #execution-<id>
    #[arg(long)]
    fragment: Option<String>,

    /// Search term for the execution list
    #[arg(long, default_value = "")]
    search: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(cli).await })
}

async fn run(cli: Cli) -> Result<()> {
  let mut config = DashboardConfig::load(cli.config.as_deref()).context("failed to load config")?;
  if let Some(database) = cli.database {
    config.database_url = Some(database);
  }
  config.validate().context("invalid config")?;

  let store = open_store(cli.records, &config).await?;
  let source = DataSource::new(store);

  let snapshot = source.load(cli.filter.into_filter()).await;
  if let Some(message) = &snapshot.error {
    bail!("{message}");
  }
  let records = snapshot.records.as_slice();

  let output = match cli.command {
    Commands::Overview { page } => {
      let mut cursor = cursor_at(config.executions_page_size, records.len(), page);
      serde_json::to_value(overview_local(records, &mut cursor))?
    }
    Commands::Steps { page } => {
      let steps: usize = records.iter().map(|r| r.steps.len()).sum();
      let mut cursor = cursor_at(config.steps_page_size, steps, page);
      serde_json::to_value(steps_analysis(records, &mut cursor))?
    }
    Commands::Drilldown {
      execution,
      fragment,
      search,
    } => {
      let mut navigator = Navigator::new();
      navigator.set_tab(Tab::Drilldown);
      if let Some(execution_id) = execution {
        navigator.select(execution_id);
      }
      if let Some(fragment) = fragment {
        if !navigator.apply_fragment(&fragment) {
          bail!("unrecognized fragment: {fragment}");
        }
      }
      let view = drilldown(
        source.store(),
        records,
        &navigator,
        &search,
        config.search_limit,
      )
      .await
      .context("failed to load execution")?;
      serde_json::to_value(view)?
    }
  };

  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

async fn open_store(
  records: Option<PathBuf>,
  config: &DashboardConfig,
) -> Result<Arc<dyn RecordStore>> {
  if let Some(path) = records {
    let store = MemoryStore::from_json_file(&path)
      .await
      .with_context(|| format!("failed to read records file: {}", path.display()))?;
    info!(path = %path.display(), "loaded records file");
    return Ok(Arc::new(store));
  }

  let Some(url) = config.database_url.as_deref() else {
    bail!("no record store configured; pass --database or --records, or set database_url");
  };
  let store = SqliteStore::connect(url)
    .await
    .with_context(|| format!("failed to open database: {url}"))?;
  info!(url, "connected to database");
  Ok(Arc::new(store))
}

fn cursor_at(page_size: usize, len: usize, page: usize) -> PageCursor {
  let mut cursor = PageCursor::new(page_size);
  cursor.observe(len);
  cursor.go_to(page);
  cursor
}
