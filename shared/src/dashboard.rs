use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregationCache, AggregationResult};
use crate::error::DashboardError;
use crate::filter::{ALL_VEHICLES, FilterState, Granularity, MeasureSelection, SortMode};
use crate::hierarchy::HierarchyIndex;
use crate::overview::{MapTimeline, OverviewSeries};
use crate::record::{IngestStats, RawRow, RecordStore};
use crate::regions::STATE_REGIONS;
use crate::render::{HeatmapPlan, render};
use crate::view::ViewState;

/// User interaction fed to [`Dashboard::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SelectMeasure { measure: MeasureSelection },
    SetYearStart { year: i32 },
    SetYearEnd { year: i32 },
    Apply,
    SetGranularity { granularity: Granularity },
    ToggleGranularity,
    SetSortMode { sort_mode: SortMode },
    ClickRegion { region: String },
    ClickState { state: String },
}

impl Action {
    pub fn is_apply(&self) -> bool {
        matches!(self, Self::Apply)
    }

    /// Whether the action can change the applied filter. Staged slider and
    /// measure edits never do.
    pub fn changes_filter(&self) -> bool {
        !matches!(
            self,
            Self::SelectMeasure { .. } | Self::SetYearStart { .. } | Self::SetYearEnd { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SelectMeasure { .. } => "select_measure",
            Self::SetYearStart { .. } => "set_year_start",
            Self::SetYearEnd { .. } => "set_year_end",
            Self::Apply => "apply",
            Self::SetGranularity { .. } => "set_granularity",
            Self::ToggleGranularity => "toggle_granularity",
            Self::SetSortMode { .. } => "set_sort_mode",
            Self::ClickRegion { .. } => "click_region",
            Self::ClickState { .. } => "click_state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Snapshot of the control panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Controls {
    pub measure_options: Vec<String>,
    pub staged_measure: MeasureSelection,
    pub sort_options: Vec<SortOption>,
    pub sort_mode: SortMode,
    pub granularity: Granularity,
    pub year_min: i32,
    pub year_max: i32,
    pub year_start: i32,
    pub year_end: i32,
    pub year_readout: String,
    pub applied: FilterState,
}

/// The whole dashboard: immutable data plus the single mutable view.
#[derive(Debug)]
pub struct Dashboard {
    store: RecordStore,
    hierarchy: HierarchyIndex,
    view: ViewState,
    cache: AggregationCache,
    overview: Option<OverviewSeries>,
    timeline: MapTimeline,
}

impl Dashboard {
    pub fn new(store: RecordStore) -> Self {
        let hierarchy = HierarchyIndex::build(store.ports(), store.port_to_state(), STATE_REGIONS);
        let view = ViewState::new(store.years(), store.measures());
        let overview = OverviewSeries::build(&store);
        let timeline = MapTimeline::build(&store);
        Self {
            store,
            hierarchy,
            view,
            cache: AggregationCache::new(),
            overview,
            timeline,
        }
    }

    pub fn from_rows(rows: &[RawRow]) -> Result<Self, DashboardError> {
        RecordStore::ingest(rows).map(Self::new)
    }

    /// Apply one action. A rejected apply leaves the applied filter as it was.
    ///
    /// Drill clicks on regions or states missing from the hierarchy, and state
    /// clicks outside the drilled region, are ignored so the aggregation scope
    /// always matches the rows the plan renders.
    pub fn dispatch(&mut self, action: Action) -> Result<(), DashboardError> {
        match action {
            Action::SelectMeasure { measure } => self.view.select_measure(measure),
            Action::SetYearStart { year } => self.view.set_year_start(year),
            Action::SetYearEnd { year } => self.view.set_year_end(year),
            Action::Apply => self.view.apply()?,
            Action::SetGranularity { granularity } => self.view.set_granularity(granularity),
            Action::ToggleGranularity => self.view.toggle_granularity(),
            Action::SetSortMode { sort_mode } => self.view.set_sort_mode(sort_mode),
            Action::ClickRegion { region } => {
                if self.hierarchy.contains_region(&region) {
                    self.view.click_region(&region);
                }
            }
            Action::ClickState { state } => {
                if self.accepts_state_drill(&state) {
                    self.view.click_state(&state);
                }
            }
        }
        Ok(())
    }

    fn accepts_state_drill(&self, state: &str) -> bool {
        if !self.hierarchy.contains_state(state) {
            return false;
        }
        match self.view.filter().drill_region.as_deref() {
            Some(region) => self.hierarchy.region_of_state(state) == Some(region),
            None => true,
        }
    }

    /// Aggregation for the applied filter, served from cache when unchanged.
    pub fn aggregation(&mut self) -> Arc<AggregationResult> {
        self.cache
            .get(&self.store, &self.hierarchy, self.view.filter())
    }

    /// Whether the next [`Self::aggregation`] call is a cache hit.
    pub fn is_cached(&self) -> bool {
        self.cache.is_valid_for(self.view.filter())
    }

    pub fn render(&mut self) -> HeatmapPlan {
        let aggregation = self.aggregation();
        render(&self.hierarchy, self.view.filter(), &aggregation)
    }

    pub fn controls(&self) -> Controls {
        let mut measure_options = Vec::with_capacity(self.store.measures().len() + 1);
        measure_options.push(ALL_VEHICLES.to_owned());
        measure_options.extend(self.store.measures().iter().cloned());

        let (year_min, year_max) = self.view.year_bounds();
        let (year_start, year_end) = self.view.year_range();
        let filter = self.view.filter();

        Controls {
            measure_options,
            staged_measure: self.view.staged_measure().clone(),
            sort_options: SortMode::ALL
                .iter()
                .map(|mode| SortOption {
                    value: mode.as_str(),
                    label: sort_label(*mode),
                })
                .collect(),
            sort_mode: filter.sort_mode,
            granularity: filter.granularity,
            year_min,
            year_max,
            year_start,
            year_end,
            year_readout: self.view.year_readout(),
            applied: filter.clone(),
        }
    }

    pub fn filter(&self) -> &FilterState {
        self.view.filter()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    pub fn ingest_stats(&self) -> IngestStats {
        self.store.stats()
    }

    pub fn overview(&self) -> Option<&OverviewSeries> {
        self.overview.as_ref()
    }

    pub fn timeline(&self) -> &MapTimeline {
        &self.timeline
    }

    pub fn recomputations(&self) -> u64 {
        self.cache.recomputations()
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache.hits()
    }
}

fn sort_label(mode: SortMode) -> &'static str {
    match mode {
        SortMode::Alphabetical => "Alphabetical",
        SortMode::HighToLow => "High to Low",
        SortMode::LowToHigh => "Low to High",
    }
}
