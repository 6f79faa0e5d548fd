use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::regions::UNKNOWN;

pub const PORT_NAME_COLUMN: &str = "Port Name";
pub const DATE_COLUMN: &str = "Date";
pub const VALUE_COLUMN: &str = "Value";
pub const MEASURE_COLUMN: &str = "Measure";
pub const STATE_COLUMN: &str = "State";
pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";

/// One parsed CSV row, accessed by header name.
pub type RawRow = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Self::Jan,
        Self::Feb,
        Self::Mar,
        Self::Apr,
        Self::May,
        Self::Jun,
        Self::Jul,
        Self::Aug,
        Self::Sep,
        Self::Oct,
        Self::Nov,
        Self::Dec,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Jan => "Jan",
            Self::Feb => "Feb",
            Self::Mar => "Mar",
            Self::Apr => "Apr",
            Self::May => "May",
            Self::Jun => "Jun",
            Self::Jul => "Jul",
            Self::Aug => "Aug",
            Self::Sep => "Sep",
            Self::Oct => "Oct",
            Self::Nov => "Nov",
            Self::Dec => "Dec",
        }
    }

    /// Month from its 1-based calendar number.
    pub fn from_number(number: u32) -> Option<Self> {
        let idx = number.checked_sub(1)? as usize;
        Self::ALL.get(idx).copied()
    }

    /// Accepts abbreviated or full English month names, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim()
            .parse::<chrono::Month>()
            .ok()
            .and_then(|month| Self::from_number(month.number_from_month()))
    }
}

/// Parse a `"Mon YYYY"` date cell into its month and year.
pub fn parse_date(raw: &str) -> Option<(Month, i32)> {
    let mut parts = raw.split_whitespace();
    let month = Month::parse(parts.next()?)?;
    let year = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((month, year))
}

/// Parse a traffic count, tolerating thousands separators and a fractional tail.
pub fn parse_value(raw: &str) -> Option<u64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ',' | '_' | ' '))
        .collect();
    let integral = match cleaned.split_once('.') {
        Some((int, frac)) if frac.chars().all(|ch| ch.is_ascii_digit()) => int,
        Some(_) => return None,
        None => cleaned.as_str(),
    };
    integral.parse::<u64>().ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub port: String,
    pub month: Month,
    pub year: i32,
    pub measure: String,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub accepted: usize,
    pub skipped_rows: usize,
    pub malformed_values: usize,
}

/// Normalized, immutable traffic records plus the lookups derived from them.
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<TrafficRecord>,
    ports: Vec<String>,
    years: Vec<i32>,
    measures: Vec<String>,
    port_to_state: HashMap<String, String>,
    port_locations: HashMap<String, GeoPoint>,
    stats: IngestStats,
}

impl RecordStore {
    /// Build the store from parsed rows.
    ///
    /// Rows missing a port, date, value or measure are skipped, as are rows
    /// whose date is not `"Mon YYYY"`. An unparsable value becomes zero.
    pub fn ingest(rows: &[RawRow]) -> Result<Self, DashboardError> {
        let mut records = Vec::with_capacity(rows.len());
        let mut stats = IngestStats::default();
        let mut port_to_state: HashMap<String, String> = HashMap::new();
        let mut port_locations: HashMap<String, GeoPoint> = HashMap::new();

        for row in rows {
            let (Some(port), Some(date), Some(raw_value), Some(measure)) = (
                field(row, PORT_NAME_COLUMN),
                field(row, DATE_COLUMN),
                field(row, VALUE_COLUMN),
                field(row, MEASURE_COLUMN),
            ) else {
                stats.skipped_rows += 1;
                continue;
            };
            let Some((month, year)) = parse_date(date) else {
                stats.skipped_rows += 1;
                continue;
            };
            let value = match parse_value(raw_value) {
                Some(value) => value,
                None => {
                    stats.malformed_values += 1;
                    0
                }
            };

            if !port_to_state.contains_key(port)
                && let Some(state) = field(row, STATE_COLUMN)
            {
                port_to_state.insert(port.to_owned(), state.to_owned());
            }
            if !port_locations.contains_key(port)
                && let Some(point) = parse_location(row)
            {
                port_locations.insert(port.to_owned(), point);
            }

            records.push(TrafficRecord {
                port: port.to_owned(),
                month,
                year,
                measure: measure.to_owned(),
                value,
            });
        }

        if records.is_empty() {
            return Err(DashboardError::EmptyDataset);
        }
        stats.accepted = records.len();

        let ports: Vec<String> = records
            .iter()
            .map(|r| r.port.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let years: Vec<i32> = records
            .iter()
            .map(|r| r.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let measures: Vec<String> = records
            .iter()
            .map(|r| r.measure.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for port in &ports {
            port_to_state
                .entry(port.clone())
                .or_insert_with(|| UNKNOWN.to_owned());
        }

        Ok(Self {
            records,
            ports,
            years,
            measures,
            port_to_state,
            port_locations,
            stats,
        })
    }

    pub fn records(&self) -> &[TrafficRecord] {
        &self.records
    }

    /// Unique port names, lexicographic.
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Unique years, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Unique measures, lexicographic.
    pub fn measures(&self) -> &[String] {
        &self.measures
    }

    pub fn port_to_state(&self) -> &HashMap<String, String> {
        &self.port_to_state
    }

    pub fn location_of(&self, port: &str) -> Option<GeoPoint> {
        self.port_locations.get(port).copied()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }
}

fn field<'a>(row: &'a RawRow, column: &str) -> Option<&'a str> {
    row.get(column)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_location(row: &RawRow) -> Option<GeoPoint> {
    let lat = field(row, LATITUDE_COLUMN)?.parse::<f64>().ok()?;
    let lng = field(row, LONGITUDE_COLUMN)?.parse::<f64>().ok()?;
    (lat.is_finite() && lng.is_finite()).then_some(GeoPoint { lat, lng })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn row(port: &str, date: &str, value: &str, measure: &str, state: &str) -> RawRow {
        [
            (PORT_NAME_COLUMN, port),
            (DATE_COLUMN, date),
            (VALUE_COLUMN, value),
            (MEASURE_COLUMN, measure),
            (STATE_COLUMN, state),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
    }

    #[test]
    fn parse_date_accepts_month_year_pairs() {
        assert_eq!(parse_date("Jan 2020"), Some((Month::Jan, 2020)));
        assert_eq!(parse_date("  dec   1999 "), Some((Month::Dec, 1999)));
        assert_eq!(parse_date("September 2004"), Some((Month::Sep, 2004)));
        assert_eq!(parse_date("2020"), None);
        assert_eq!(parse_date("Foo 2020"), None);
        assert_eq!(parse_date("Jan 2020 extra"), None);
    }

    #[test]
    fn parse_value_strips_formatting_noise() {
        assert_eq!(parse_value("1,234"), Some(1234));
        assert_eq!(parse_value(" 42 "), Some(42));
        assert_eq!(parse_value("17.0"), Some(17));
        assert_eq!(parse_value("n/a"), None);
        assert_eq!(parse_value("-5"), None);
    }

    #[test]
    fn ingest_skips_incomplete_rows_and_degrades_bad_values() {
        let rows = vec![
            row("Blaine", "Jan 2020", "10", "Trucks", "Washington"),
            row("Blaine", "Feb 2020", "oops", "Trucks", "Washington"),
            row("", "Feb 2020", "5", "Trucks", "Washington"),
            row("Sumas", "Feb 2020", "", "Trucks", "Washington"),
            row("Sumas", "not a date", "7", "Trucks", "Washington"),
        ];

        let store = RecordStore::ingest(&rows).expect("rows should ingest");
        assert_eq!(store.records().len(), 2);
        assert_eq!(store.records()[1].value, 0);
        assert_eq!(
            store.stats(),
            IngestStats {
                accepted: 2,
                skipped_rows: 3,
                malformed_values: 1,
            }
        );
    }

    #[test]
    fn ingest_sorts_lookup_tables() {
        let rows = vec![
            row("Laredo", "Mar 2021", "3", "Trucks", "Texas"),
            row("Blaine", "Jan 2019", "1", "Pedestrians", "Washington"),
            row("Calais", "Feb 2020", "2", "Buses", "Maine"),
            row("Blaine", "Jan 2021", "1", "Trucks", "Washington"),
        ];

        let store = RecordStore::ingest(&rows).expect("rows should ingest");
        assert_eq!(store.ports(), ["Blaine", "Calais", "Laredo"]);
        assert_eq!(store.years(), [2019, 2020, 2021]);
        assert_eq!(store.measures(), ["Buses", "Pedestrians", "Trucks"]);
    }

    #[test]
    fn first_row_with_a_state_owns_the_port() {
        let rows = vec![
            row("Blaine", "Jan 2020", "1", "Trucks", ""),
            row("Blaine", "Feb 2020", "1", "Trucks", "Washington"),
            row("Blaine", "Mar 2020", "1", "Trucks", "Idaho"),
            row("Nowhere", "Mar 2020", "1", "Trucks", " "),
        ];

        let store = RecordStore::ingest(&rows).expect("rows should ingest");
        assert_eq!(store.port_to_state()["Blaine"], "Washington");
        assert_eq!(store.port_to_state()["Nowhere"], UNKNOWN);
    }

    #[test]
    fn ingest_captures_first_valid_location() {
        let mut first = row("Blaine", "Jan 2020", "1", "Trucks", "Washington");
        first.insert(LATITUDE_COLUMN.to_owned(), "bad".to_owned());
        first.insert(LONGITUDE_COLUMN.to_owned(), "-122.7".to_owned());
        let mut second = row("Blaine", "Feb 2020", "1", "Trucks", "Washington");
        second.insert(LATITUDE_COLUMN.to_owned(), "49.0".to_owned());
        second.insert(LONGITUDE_COLUMN.to_owned(), "-122.75".to_owned());

        let store = RecordStore::ingest(&[first, second]).expect("rows should ingest");
        assert_eq!(
            store.location_of("Blaine"),
            Some(GeoPoint {
                lat: 49.0,
                lng: -122.75,
            })
        );
        assert_eq!(store.location_of("Sumas"), None);
    }

    #[test]
    fn ingest_without_usable_rows_is_an_empty_dataset() {
        let rows = vec![row("", "", "", "", "")];
        assert_eq!(
            RecordStore::ingest(&rows).err(),
            Some(DashboardError::EmptyDataset)
        );
        assert_eq!(
            RecordStore::ingest(&[]).err(),
            Some(DashboardError::EmptyDataset)
        );
    }
}
