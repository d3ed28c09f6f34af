//! Fetch cycles and snapshot publication.
//!
//! A [`DataSource`] runs one fetch cycle per [`DataSource::load`] or
//! [`DataSource::refetch`] call and publishes the outcome as a [`Snapshot`] on
//! a watch channel. Cycles may overlap. Each cycle is numbered when it starts,
//! and a cycle that finishes after a newer one started is discarded, so the
//! published snapshot always belongs to the most recently started cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use prism_analytics::{CompositeExecution, join};
use prism_store::{Filter, RecordStore};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::error::DashboardError;

/// The state of the most recent fetch cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  /// Number of the cycle this snapshot belongs to; 0 before the first load.
  pub cycle: u64,
  /// Filter the cycle fetched with.
  pub filter: Filter,
  /// Joined records, replaced wholesale by each completed cycle.
  pub records: Arc<Vec<CompositeExecution>>,
  /// Whether the cycle is still in flight.
  pub loading: bool,
  /// Failure message of the cycle. Records are empty when set.
  pub error: Option<String>,
}

/// Source of dashboard snapshots backed by a [`RecordStore`].
pub struct DataSource<S: RecordStore> {
  store: S,
  cycle: AtomicU64,
  sender: watch::Sender<Snapshot>,
}

impl<S: RecordStore> DataSource<S> {
  pub fn new(store: S) -> Self {
    let (sender, _) = watch::channel(Snapshot::default());
    Self {
      store,
      cycle: AtomicU64::new(0),
      sender,
    }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Receive every snapshot published from now on.
  pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
    self.sender.subscribe()
  }

  /// The latest published snapshot.
  pub fn snapshot(&self) -> Snapshot {
    self.sender.borrow().clone()
  }

  /// Replace the filter and run a fetch cycle with it.
  ///
  /// Returns the latest snapshot once this cycle finished. If a newer cycle
  /// started meanwhile, that is the newer cycle's state.
  #[instrument(name = "fetch_cycle", skip(self, filter))]
  pub async fn load(&self, filter: Filter) -> Snapshot {
    let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
    info!(cycle, "fetch cycle started");

    self.sender.send_if_modified(|snapshot| {
      if snapshot.cycle > cycle {
        return false;
      }
      snapshot.cycle = cycle;
      snapshot.filter = filter.clone();
      snapshot.loading = true;
      true
    });

    let outcome = self.fetch(&filter).await;

    let published = self.sender.send_if_modified(|snapshot| {
      if self.cycle.load(Ordering::SeqCst) != cycle {
        return false;
      }
      let (records, error) = match outcome {
        Ok(records) => (records, None),
        Err(e) => (Vec::new(), Some(e.to_string())),
      };
      *snapshot = Snapshot {
        cycle,
        filter,
        records: Arc::new(records),
        loading: false,
        error,
      };
      true
    });

    if published {
      let snapshot = self.sender.borrow();
      match &snapshot.error {
        None => info!(cycle, executions = snapshot.records.len(), "fetch cycle completed"),
        Some(message) => error!(cycle, error = %message, "fetch cycle failed"),
      }
    } else {
      debug!(cycle, "discarding stale fetch cycle");
    }

    self.snapshot()
  }

  /// Run a fetch cycle with the current filter.
  pub async fn refetch(&self) -> Snapshot {
    let filter = self.sender.borrow().filter.clone();
    self.load(filter).await
  }

  async fn fetch(&self, filter: &Filter) -> Result<Vec<CompositeExecution>, DashboardError> {
    let records = self.store.fetch(filter).await?;
    Ok(join(records)?)
  }
}
