use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::filter::{FilterState, Granularity};
use crate::hierarchy::{HierarchyIndex, Scope};
use crate::record::{Month, RecordStore};

/// Time column of a heatmap cell. `year` is `None` when months are folded
/// across the selected years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot {
    pub year: Option<i32>,
    pub month: Month,
}

/// Filtered totals for one [`FilterState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationResult {
    cells: HashMap<String, HashMap<TimeSlot, u64>>,
    port_totals: HashMap<String, u64>,
    /// Smallest positive cell total, or 0 when no cell is positive.
    pub min_value: u64,
    /// Largest positive cell total, or 1 when no cell is positive.
    pub max_value: u64,
}

impl AggregationResult {
    /// Sum the records matching `filter`.
    pub fn compute(store: &RecordStore, hierarchy: &HierarchyIndex, filter: &FilterState) -> Self {
        let scope = match (&filter.drill_state, &filter.drill_region) {
            (Some(state), _) => Scope::State(state),
            (None, Some(region)) => Scope::Region(region),
            (None, None) => Scope::All,
        };
        let display_ports: HashSet<&str> = hierarchy.ports_under(scope).into_iter().collect();

        let mut cells: HashMap<String, HashMap<TimeSlot, u64>> = HashMap::new();
        let mut port_totals: HashMap<String, u64> = HashMap::new();

        for record in store.records() {
            if !filter.includes_year(record.year)
                || !display_ports.contains(record.port.as_str())
                || !filter.measure.matches(&record.measure)
            {
                continue;
            }

            let slot = TimeSlot {
                year: match filter.granularity {
                    Granularity::ByYear => Some(record.year),
                    Granularity::ByMonth => None,
                },
                month: record.month,
            };
            // Totals saturate at u64::MAX rather than wrap.
            let cell = cells
                .entry(record.port.clone())
                .or_default()
                .entry(slot)
                .or_insert(0);
            *cell = cell.saturating_add(record.value);
            let total = port_totals.entry(record.port.clone()).or_insert(0);
            *total = total.saturating_add(record.value);
        }

        let mut positive = cells
            .values()
            .flat_map(HashMap::values)
            .copied()
            .filter(|value| *value > 0)
            .peekable();
        let (min_value, max_value) = if positive.peek().is_none() {
            (0, 1)
        } else {
            positive.fold((u64::MAX, 0), |(min, max), value| {
                (min.min(value), max.max(value))
            })
        };

        Self {
            cells,
            port_totals,
            min_value,
            max_value,
        }
    }

    /// Total for one cell; absent cells are zero.
    pub fn cell(&self, port: &str, slot: TimeSlot) -> u64 {
        self.cells
            .get(port)
            .and_then(|slots| slots.get(&slot))
            .copied()
            .unwrap_or(0)
    }

    /// Grand total of `port` under the filter, regardless of granularity.
    pub fn port_total(&self, port: &str) -> u64 {
        self.port_totals.get(port).copied().unwrap_or(0)
    }

    /// Sum of every cell.
    pub fn grand_total(&self) -> u64 {
        self.cells
            .values()
            .flat_map(HashMap::values)
            .fold(0, |sum: u64, value| sum.saturating_add(*value))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.values().map(HashMap::len).sum()
    }

    /// Iterate `(port, slot, total)` over every populated cell.
    pub fn cells(&self) -> impl Iterator<Item = (&str, TimeSlot, u64)> + '_ {
        self.cells.iter().flat_map(|(port, slots)| {
            slots
                .iter()
                .map(move |(slot, total)| (port.as_str(), *slot, *total))
        })
    }
}

/// Single-entry cache of the most recent aggregation.
#[derive(Debug, Default)]
pub struct AggregationCache {
    entry: Option<(FilterState, Arc<AggregationResult>)>,
    recomputations: u64,
    hits: u64,
}

impl AggregationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result when `filter` equals the cached key, otherwise
    /// rescan the records and replace the entry.
    pub fn get(
        &mut self,
        store: &RecordStore,
        hierarchy: &HierarchyIndex,
        filter: &FilterState,
    ) -> Arc<AggregationResult> {
        if let Some((key, result)) = &self.entry
            && key == filter
        {
            self.hits += 1;
            return Arc::clone(result);
        }

        let result = Arc::new(AggregationResult::compute(store, hierarchy, filter));
        self.recomputations += 1;
        self.entry = Some((filter.clone(), Arc::clone(&result)));
        result
    }

    /// Drop the cached entry so the next [`Self::get`] recomputes.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_valid_for(&self, filter: &FilterState) -> bool {
        self.entry.as_ref().is_some_and(|(key, _)| key == filter)
    }

    /// Number of full record scans performed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}
