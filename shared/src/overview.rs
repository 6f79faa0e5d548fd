//! Companion views over the same records: the yearly overview line chart and
//! the month-by-month port map.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::colors::map_heat_color;
use crate::record::{GeoPoint, Month, RecordStore};

/// Earliest year plotted on the overview chart.
pub const OVERVIEW_FIRST_YEAR: i32 = 1996;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventAnnotation {
    pub year: i32,
    pub label: &'static str,
    pub color: &'static str,
}

/// Events marked on the overview chart.
pub const EVENT_ANNOTATIONS: [EventAnnotation; 3] = [
    EventAnnotation {
        year: 2001,
        label: "9/11",
        color: "red",
    },
    EventAnnotation {
        year: 2008,
        label: "2008 Great Recession",
        color: "brown",
    },
    EventAnnotation {
        year: 2020,
        label: "2020 Pandemic",
        color: "orange",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearTotal {
    pub year: i32,
    pub total: u64,
}

/// Total crossings per year with event markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewSeries {
    pub points: Vec<YearTotal>,
    pub annotations: Vec<EventAnnotation>,
    pub max_total: u64,
    /// Top of the y axis and of the event marker lines.
    pub y_axis_max: f64,
    /// Height at which annotation labels sit.
    pub annotation_y: f64,
}

impl OverviewSeries {
    /// Sum positive values per year from [`OVERVIEW_FIRST_YEAR`] on.
    /// Returns `None` when nothing qualifies.
    pub fn build(store: &RecordStore) -> Option<Self> {
        let mut yearly: BTreeMap<i32, u64> = BTreeMap::new();
        for record in store.records() {
            if record.year >= OVERVIEW_FIRST_YEAR && record.value > 0 {
                let total = yearly.entry(record.year).or_insert(0);
                *total = total.saturating_add(record.value);
            }
        }
        if yearly.is_empty() {
            return None;
        }

        let points: Vec<YearTotal> = yearly
            .into_iter()
            .map(|(year, total)| YearTotal { year, total })
            .collect();
        let max_total = points.iter().map(|p| p.total).max().unwrap_or(0);

        Some(Self {
            points,
            annotations: EVENT_ANNOTATIONS.to_vec(),
            max_total,
            y_axis_max: max_total as f64 * 1.1,
            annotation_y: max_total as f64 * 1.05,
        })
    }

    /// Cumulative slider frame: every point up to and including `year`.
    pub fn points_through(&self, year: i32) -> &[YearTotal] {
        let end = self.points.partition_point(|p| p.year <= year);
        &self.points[..end]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatPoint {
    pub port: String,
    pub lat: f64,
    pub lng: f64,
    pub value: u64,
    /// Value normalised against the frame's min/max, 0.0..=1.0.
    pub intensity: f64,
    pub color: (u8, u8, u8),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFrame {
    pub index: usize,
    pub label: String,
    pub points: Vec<HeatPoint>,
    /// South-west and north-east corners enclosing every point.
    pub bounds: Option<[GeoPoint; 2]>,
}

type FramePorts = BTreeMap<String, (GeoPoint, u64)>;

/// Chronological per-month port totals for the animated map.
#[derive(Debug, Clone, Default)]
pub struct MapTimeline {
    frames: Vec<((i32, Month), FramePorts)>,
}

impl MapTimeline {
    /// Ports without coordinates are left off the map.
    pub fn build(store: &RecordStore) -> Self {
        let mut by_date: BTreeMap<(i32, Month), FramePorts> = BTreeMap::new();
        for record in store.records() {
            let Some(location) = store.location_of(&record.port) else {
                continue;
            };
            let entry = by_date
                .entry((record.year, record.month))
                .or_default()
                .entry(record.port.clone())
                .or_insert((location, 0));
            entry.1 = entry.1.saturating_add(record.value);
        }
        Self {
            frames: by_date.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `"Mon YYYY"` label of every frame, in order.
    pub fn labels(&self) -> Vec<String> {
        self.frames
            .iter()
            .map(|((year, month), _)| date_label(*year, *month))
            .collect()
    }

    pub fn frame(&self, index: usize) -> Option<MapFrame> {
        let ((year, month), ports) = self.frames.get(index)?;
        let min = ports.values().map(|(_, v)| *v).min().unwrap_or(0);
        let max = ports.values().map(|(_, v)| *v).max().unwrap_or(0);

        let points: Vec<HeatPoint> = ports
            .iter()
            .map(|(port, (location, value))| {
                let intensity = if max > min {
                    (*value - min) as f64 / (max - min) as f64
                } else {
                    1.0
                };
                HeatPoint {
                    port: port.clone(),
                    lat: location.lat,
                    lng: location.lng,
                    value: *value,
                    intensity,
                    color: map_heat_color(intensity),
                }
            })
            .collect();

        Some(MapFrame {
            index,
            label: date_label(*year, *month),
            bounds: bounds_of(&points),
            points,
        })
    }
}

fn date_label(year: i32, month: Month) -> String {
    format!("{} {year}", month.label())
}

fn bounds_of(points: &[HeatPoint]) -> Option<[GeoPoint; 2]> {
    let first = points.first()?;
    let mut south_west = GeoPoint {
        lat: first.lat,
        lng: first.lng,
    };
    let mut north_east = south_west;
    for point in &points[1..] {
        south_west.lat = south_west.lat.min(point.lat);
        south_west.lng = south_west.lng.min(point.lng);
        north_east.lat = north_east.lat.max(point.lat);
        north_east.lng = north_east.lng.max(point.lng);
    }
    Some([south_west, north_east])
}

/// Indices of timeline labels to show on a track `width` pixels wide, keeping
/// at least `min_spacing` between shown labels. First and last always show.
pub fn sparse_label_indices(count: usize, width: f64, min_spacing: f64) -> Vec<usize> {
    match count {
        0 => return Vec::new(),
        1 => return vec![0],
        _ => {}
    }
    let step = width / (count - 1) as f64;
    let mut shown = Vec::new();
    let mut last_pos = f64::NEG_INFINITY;
    for idx in 0..count {
        let pos = idx as f64 * step;
        if idx == 0 || idx == count - 1 || pos - last_pos >= min_spacing {
            shown.push(idx);
            last_pos = pos;
        }
    }
    shown
}
