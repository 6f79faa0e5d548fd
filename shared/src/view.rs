use crate::error::DashboardError;
use crate::filter::{DEFAULT_MEASURE, FilterState, Granularity, MeasureSelection, SortMode};

/// Filter selections behind the heatmap.
///
/// Measure and year sliders are staged and only reach the applied
/// [`FilterState`] through [`ViewState::apply`]; sort, granularity and drill
/// changes apply immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    available_years: Vec<i32>,
    staged_measure: MeasureSelection,
    year_start: i32,
    year_end: i32,
    filter: FilterState,
}

impl ViewState {
    /// Start on every data year and on the default measure when present.
    pub fn new(years: &[i32], measures: &[String]) -> Self {
        let mut available_years = years.to_vec();
        available_years.sort_unstable();
        available_years.dedup();

        let measure = if measures.iter().any(|m| m == DEFAULT_MEASURE) {
            MeasureSelection::Named(DEFAULT_MEASURE.to_owned())
        } else {
            MeasureSelection::AllVehicles
        };
        let year_start = available_years.first().copied().unwrap_or_default();
        let year_end = available_years.last().copied().unwrap_or_default();
        let filter = FilterState::new(measure.clone(), available_years.clone());

        Self {
            available_years,
            staged_measure: measure,
            year_start,
            year_end,
            filter,
        }
    }

    /// The applied filter that drives aggregation.
    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn staged_measure(&self) -> &MeasureSelection {
        &self.staged_measure
    }

    /// Lowest and highest data year.
    pub fn year_bounds(&self) -> (i32, i32) {
        (
            self.available_years.first().copied().unwrap_or_default(),
            self.available_years.last().copied().unwrap_or_default(),
        )
    }

    /// Current slider positions, `start <= end`.
    pub fn year_range(&self) -> (i32, i32) {
        (self.year_start, self.year_end)
    }

    pub fn year_readout(&self) -> String {
        format!("{} – {}", self.year_start, self.year_end)
    }

    pub fn select_measure(&mut self, measure: MeasureSelection) {
        self.staged_measure = measure;
    }

    /// Move the start slider; the end slider follows when overtaken.
    pub fn set_year_start(&mut self, year: i32) {
        let year = self.clamp_year(year);
        self.year_start = year;
        if year > self.year_end {
            self.year_end = year;
        }
    }

    /// Move the end slider; the start slider follows when overtaken.
    pub fn set_year_end(&mut self, year: i32) {
        let year = self.clamp_year(year);
        self.year_end = year;
        if year < self.year_start {
            self.year_start = year;
        }
    }

    /// Data years inside the slider range.
    pub fn years_in_range(&self) -> Vec<i32> {
        self.available_years
            .iter()
            .copied()
            .filter(|year| (self.year_start..=self.year_end).contains(year))
            .collect()
    }

    /// Commit the staged measure and year range.
    ///
    /// Fails without touching the applied filter when the range holds no data
    /// year.
    pub fn apply(&mut self) -> Result<(), DashboardError> {
        let years = self.years_in_range();
        if years.is_empty() {
            return Err(DashboardError::EmptyFilterSelection {
                start: self.year_start,
                end: self.year_end,
            });
        }
        self.filter.measure = self.staged_measure.clone();
        self.filter.years = years;
        Ok(())
    }

    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.filter.granularity = granularity;
    }

    pub fn toggle_granularity(&mut self) {
        self.filter.granularity = match self.filter.granularity {
            Granularity::ByYear => Granularity::ByMonth,
            Granularity::ByMonth => Granularity::ByYear,
        };
    }

    pub fn set_sort_mode(&mut self, sort_mode: SortMode) {
        self.filter.sort_mode = sort_mode;
    }

    /// Toggle the region drill and always leave state drill.
    pub fn click_region(&mut self, region: &str) {
        self.filter.drill_state = None;
        self.filter.drill_region = toggled(self.filter.drill_region.take(), region);
    }

    /// Toggle the state drill; the region drill is left as is.
    pub fn click_state(&mut self, state: &str) {
        self.filter.drill_state = toggled(self.filter.drill_state.take(), state);
    }

    fn clamp_year(&self, year: i32) -> i32 {
        let (min, max) = self.year_bounds();
        year.clamp(min, max)
    }
}

fn toggled(current: Option<String>, clicked: &str) -> Option<String> {
    match current {
        Some(active) if active == clicked => None,
        _ => Some(clicked.to_owned()),
    }
}
