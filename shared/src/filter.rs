use serde::{Deserialize, Serialize};

/// Label of the synthetic measure that sums every traffic type.
pub const ALL_VEHICLES: &str = "All Vehicles";

/// Measure the dashboard opens on when the dataset has it.
pub const DEFAULT_MEASURE: &str = "Trucks";

/// Selected traffic measure; serialized as its display label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MeasureSelection {
    AllVehicles,
    Named(String),
}

impl MeasureSelection {
    pub fn label(&self) -> &str {
        match self {
            Self::AllVehicles => ALL_VEHICLES,
            Self::Named(name) => name,
        }
    }

    pub fn matches(&self, measure: &str) -> bool {
        match self {
            Self::AllVehicles => true,
            Self::Named(name) => name == measure,
        }
    }
}

impl From<&str> for MeasureSelection {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed == ALL_VEHICLES || trimmed.eq_ignore_ascii_case("all") {
            Self::AllVehicles
        } else {
            Self::Named(trimmed.to_owned())
        }
    }
}

impl From<String> for MeasureSelection {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<MeasureSelection> for String {
    fn from(value: MeasureSelection) -> Self {
        match value {
            MeasureSelection::AllVehicles => ALL_VEHICLES.to_owned(),
            MeasureSelection::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One column per (year, month).
    #[default]
    ByYear,
    /// One column per month, folded across the selected years.
    ByMonth,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByYear => "by_year",
            Self::ByMonth => "by_month",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortMode {
    #[default]
    #[serde(rename = "alpha")]
    Alphabetical,
    #[serde(rename = "high-low")]
    HighToLow,
    #[serde(rename = "low-high")]
    LowToHigh,
}

impl SortMode {
    pub const ALL: [SortMode; 3] = [Self::Alphabetical, Self::HighToLow, Self::LowToHigh];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alphabetical => "alpha",
            Self::HighToLow => "high-low",
            Self::LowToHigh => "low-high",
        }
    }
}

/// Applied filter selections. Equality on this value decides cache validity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    pub measure: MeasureSelection,
    /// Selected data years, ascending.
    pub years: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill_state: Option<String>,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub sort_mode: SortMode,
}

impl FilterState {
    pub fn new(measure: MeasureSelection, mut years: Vec<i32>) -> Self {
        years.sort_unstable();
        years.dedup();
        Self {
            measure,
            years,
            drill_region: None,
            drill_state: None,
            granularity: Granularity::default(),
            sort_mode: SortMode::default(),
        }
    }

    pub fn includes_year(&self, year: i32) -> bool {
        self.years.binary_search(&year).is_ok()
    }

    /// Deterministic text encoding of every field, in a fixed order.
    pub fn canonical_key(&self) -> String {
        let years = self
            .years
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.measure.label(),
            years,
            self.drill_region.as_deref().unwrap_or(""),
            self.drill_state.as_deref().unwrap_or(""),
            self.granularity.as_str(),
            self.sort_mode.as_str(),
        )
    }

    /// CRC32 of [`Self::canonical_key`], suitable for HTTP entity tags.
    pub fn fingerprint(&self) -> u32 {
        crc32fast::hash(self.canonical_key().as_bytes())
    }
}
