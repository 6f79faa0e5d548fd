use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use border_traffic_shared::{Dashboard, DashboardError};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::{dataset_path, recompute_yield, static_dir};

/// Lifecycle of the single dataset the server holds.
#[derive(Debug, Default)]
pub enum DatasetSlot {
    #[default]
    Loading,
    Ready {
        dashboard: Box<Dashboard>,
        loaded_at: DateTime<Utc>,
    },
    Failed(DashboardError),
}

impl DatasetSlot {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready { .. } => "ready",
            Self::Failed(DashboardError::EmptyDataset) => "no_data",
            Self::Failed(_) => "error",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

#[derive(Clone)]
pub struct AppState {
    /// Every action runs to completion under this lock.
    pub dataset: Arc<Mutex<DatasetSlot>>,
    pub apply_in_progress: Arc<AtomicBool>,
    pub dataset_path: PathBuf,
    pub static_dir: PathBuf,
    pub recompute_yield: Duration,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    heatmap_requests_total: AtomicU64,
    heatmap_not_modified_total: AtomicU64,
    aggregation_cache_hits_total: AtomicU64,
    aggregation_cache_misses_total: AtomicU64,
    actions_total: AtomicU64,
    rejected_applies_total: AtomicU64,
    empty_selections_total: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub heatmap_requests_total: u64,
    pub heatmap_not_modified_total: u64,
    pub aggregation_cache_hits_total: u64,
    pub aggregation_cache_misses_total: u64,
    pub actions_total: u64,
    pub rejected_applies_total: u64,
    pub empty_selections_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            heatmap_requests_total: self.heatmap_requests_total.load(Ordering::Relaxed),
            heatmap_not_modified_total: self.heatmap_not_modified_total.load(Ordering::Relaxed),
            aggregation_cache_hits_total: self
                .aggregation_cache_hits_total
                .load(Ordering::Relaxed),
            aggregation_cache_misses_total: self
                .aggregation_cache_misses_total
                .load(Ordering::Relaxed),
            actions_total: self.actions_total.load(Ordering::Relaxed),
            rejected_applies_total: self.rejected_applies_total.load(Ordering::Relaxed),
            empty_selections_total: self.empty_selections_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_heatmap_request(&self) {
        self.heatmap_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heatmap_not_modified(&self) {
        self.heatmap_not_modified_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregation_lookup(&self, cache_hit: bool) {
        let counter = if cache_hit {
            &self.aggregation_cache_hits_total
        } else {
            &self.aggregation_cache_misses_total
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action(&self) {
        self.actions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_apply(&self) {
        self.rejected_applies_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_selection(&self) {
        self.empty_selections_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(dataset_path: PathBuf, static_dir: PathBuf, recompute_yield: Duration) -> Self {
        Self {
            dataset: Arc::new(Mutex::new(DatasetSlot::Loading)),
            apply_in_progress: Arc::new(AtomicBool::new(false)),
            dataset_path,
            static_dir,
            recompute_yield,
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(dataset_path(), static_dir(), recompute_yield())
    }

    /// Replace the slot with a finished load.
    pub async fn install(&self, loaded: Result<Dashboard, DashboardError>) {
        let slot = match loaded {
            Ok(dashboard) => DatasetSlot::Ready {
                dashboard: Box::new(dashboard),
                loaded_at: Utc::now(),
            },
            Err(e) => DatasetSlot::Failed(e),
        };
        *self.dataset.lock().await = slot;
    }

    /// Claim the apply flag; `None` when another apply holds it.
    pub fn begin_apply(&self) -> Option<ApplyGuard> {
        if self.apply_in_progress.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(ApplyGuard {
            flag: Arc::clone(&self.apply_in_progress),
        })
    }
}

/// Clears the apply flag when dropped.
#[derive(Debug)]
pub struct ApplyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ApplyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(PathBuf::from("missing.csv"), PathBuf::from("public"), Duration::ZERO)
    }

    #[test]
    fn only_one_apply_guard_at_a_time() {
        let state = state();
        let guard = state.begin_apply().expect("first apply");
        assert!(state.begin_apply().is_none());
        drop(guard);
        assert!(state.begin_apply().is_some());
    }

    #[tokio::test]
    async fn install_reports_slot_status() {
        let state = state();
        assert_eq!(state.dataset.lock().await.status(), "loading");

        state.install(Err(DashboardError::EmptyDataset)).await;
        assert_eq!(state.dataset.lock().await.status(), "no_data");

        state
            .install(Err(DashboardError::DatasetLoadFailure("boom".to_owned())))
            .await;
        assert_eq!(state.dataset.lock().await.status(), "error");
        assert!(!state.dataset.lock().await.is_ready());
    }

    #[test]
    fn cache_lookups_split_into_hits_and_misses() {
        let counters = ObservabilityCounters::default();
        counters.record_aggregation_lookup(true);
        counters.record_aggregation_lookup(false);
        counters.record_aggregation_lookup(false);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.aggregation_cache_hits_total, 1);
        assert_eq!(snapshot.aggregation_cache_misses_total, 2);
    }
}
