use std::cmp::Reverse;

use serde::Serialize;

use crate::aggregate::{AggregationResult, TimeSlot};
use crate::colors::{LEVEL_RAMP, color_level, level_color};
use crate::filter::{FilterState, Granularity, SortMode};
use crate::hierarchy::HierarchyIndex;
use crate::record::Month;

/// Uniform grid row height in pixels.
pub const ROW_HEIGHT: u32 = 20;
/// Height of the column header band above the first body row.
pub const HEADER_HEIGHT: u32 = 2 * ROW_HEIGHT;
/// Widths of the region, state and port label columns.
pub const LABEL_COLUMN_WIDTHS: [u32; 3] = [80, 110, 150];

const REGION_EDGE_X: u32 = LABEL_COLUMN_WIDTHS[0];
const STATE_EDGE_X: u32 = REGION_EDGE_X + LABEL_COLUMN_WIDTHS[1];
const PORT_EDGE_X: u32 = STATE_EDGE_X + LABEL_COLUMN_WIDTHS[2];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnHeader {
    Year { year: i32, span: usize },
    Month { month: Month },
}

/// A region or state label spanning consecutive body rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSpan {
    pub name: String,
    pub start_row: usize,
    pub row_span: usize,
    pub active: bool,
    pub collapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatCell {
    pub column: usize,
    pub value: u64,
    pub level: u8,
    pub color: &'static str,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanRow {
    Port {
        row: usize,
        region: String,
        state: String,
        port: String,
        cells: Vec<HeatCell>,
    },
    /// Placeholder for a region hidden by another region's drill.
    CollapsedRegion { row: usize, region: String },
    /// Placeholder for a state hidden by another state's drill.
    CollapsedState {
        row: usize,
        region: String,
        state: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    RegionToState,
    StateToPort,
}

/// Connector from a label midpoint to a child label, in overlay pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorLine {
    pub kind: LineKind,
    pub owner: String,
    pub target: String,
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub active: bool,
}

/// Everything a render sink needs to draw one heatmap frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapPlan {
    pub fingerprint: u32,
    pub granularity: Granularity,
    pub sort_mode: SortMode,
    pub years: Vec<i32>,
    pub label_column_widths: [u32; 3],
    pub row_height: u32,
    pub column_count: usize,
    pub row_count: usize,
    pub columns: Vec<ColumnHeader>,
    pub region_labels: Vec<LabelSpan>,
    pub state_labels: Vec<LabelSpan>,
    pub rows: Vec<PlanRow>,
    pub lines: Vec<ConnectorLine>,
    pub min_value: u64,
    pub max_value: u64,
    pub legend: [&'static str; 5],
}

impl HeatmapPlan {
    pub fn port_rows(&self) -> impl Iterator<Item = (&str, &[HeatCell])> + '_ {
        self.rows.iter().filter_map(|row| match row {
            PlanRow::Port { port, cells, .. } => Some((port.as_str(), cells.as_slice())),
            _ => None,
        })
    }
}

/// Project the hierarchy and aggregation into a draw plan for `filter`.
pub fn render(
    hierarchy: &HierarchyIndex,
    filter: &FilterState,
    aggregation: &AggregationResult,
) -> HeatmapPlan {
    let slots = time_slots(filter);
    let mut plan = HeatmapPlan {
        fingerprint: filter.fingerprint(),
        granularity: filter.granularity,
        sort_mode: filter.sort_mode,
        years: filter.years.clone(),
        label_column_widths: LABEL_COLUMN_WIDTHS,
        row_height: ROW_HEIGHT,
        column_count: slots.len(),
        row_count: 0,
        columns: column_headers(filter),
        region_labels: Vec::new(),
        state_labels: Vec::new(),
        rows: Vec::new(),
        lines: Vec::new(),
        min_value: aggregation.min_value,
        max_value: aggregation.max_value,
        legend: LEVEL_RAMP,
    };

    let mut row = 0usize;
    for region in hierarchy.regions() {
        let region_active = filter.drill_region.as_deref() == Some(region.as_str());
        if filter.drill_region.is_some() && !region_active {
            plan.region_labels.push(LabelSpan {
                name: region.clone(),
                start_row: row,
                row_span: 1,
                active: false,
                collapsed: true,
            });
            plan.rows.push(PlanRow::CollapsedRegion {
                row,
                region: region.clone(),
            });
            row += 1;
            continue;
        }

        let region_start = row;
        let mut state_midpoints = Vec::new();
        for state in hierarchy.states_in(region) {
            let state_active = filter.drill_state.as_deref() == Some(state.as_str());
            let state_start = row;

            if filter.drill_state.is_some() && !state_active {
                plan.state_labels.push(LabelSpan {
                    name: state.clone(),
                    start_row: state_start,
                    row_span: 1,
                    active: false,
                    collapsed: true,
                });
                plan.rows.push(PlanRow::CollapsedState {
                    row,
                    region: region.clone(),
                    state: state.clone(),
                });
                state_midpoints.push((state, block_midpoint(state_start, 1)));
                row += 1;
                continue;
            }

            let ports = order_ports(hierarchy.ports_in(state), filter.sort_mode, aggregation);
            let state_mid = block_midpoint(state_start, ports.len());
            for port in &ports {
                plan.lines.push(ConnectorLine {
                    kind: LineKind::StateToPort,
                    owner: state.clone(),
                    target: (*port).to_owned(),
                    x1: STATE_EDGE_X,
                    y1: state_mid,
                    x2: PORT_EDGE_X,
                    y2: block_midpoint(row, 1),
                    active: state_active,
                });
                plan.rows.push(PlanRow::Port {
                    row,
                    region: region.clone(),
                    state: state.clone(),
                    port: (*port).to_owned(),
                    cells: port_cells(port, &slots, filter, aggregation),
                });
                row += 1;
            }

            plan.state_labels.push(LabelSpan {
                name: state.clone(),
                start_row: state_start,
                row_span: ports.len(),
                active: state_active,
                collapsed: false,
            });
            state_midpoints.push((state, state_mid));
        }

        let region_span = row - region_start;
        let region_mid = block_midpoint(region_start, region_span);
        plan.region_labels.push(LabelSpan {
            name: region.clone(),
            start_row: region_start,
            row_span: region_span,
            active: region_active,
            collapsed: false,
        });
        for (state, state_mid) in state_midpoints {
            plan.lines.push(ConnectorLine {
                kind: LineKind::RegionToState,
                owner: region.clone(),
                target: state.clone(),
                x1: REGION_EDGE_X,
                y1: region_mid,
                x2: STATE_EDGE_X,
                y2: state_mid,
                active: region_active,
            });
        }
    }

    plan.row_count = row;
    plan
}

/// Columns in display order: every selected year × month, or the 12 months.
pub fn time_slots(filter: &FilterState) -> Vec<TimeSlot> {
    match filter.granularity {
        Granularity::ByYear => filter
            .years
            .iter()
            .flat_map(|&year| {
                Month::ALL.into_iter().map(move |month| TimeSlot {
                    year: Some(year),
                    month,
                })
            })
            .collect(),
        Granularity::ByMonth => Month::ALL
            .into_iter()
            .map(|month| TimeSlot { year: None, month })
            .collect(),
    }
}

fn column_headers(filter: &FilterState) -> Vec<ColumnHeader> {
    match filter.granularity {
        Granularity::ByYear => filter
            .years
            .iter()
            .map(|&year| ColumnHeader::Year {
                year,
                span: Month::ALL.len(),
            })
            .collect(),
        Granularity::ByMonth => Month::ALL
            .into_iter()
            .map(|month| ColumnHeader::Month { month })
            .collect(),
    }
}

/// Alphabetical baseline, then a stable sort by grand total when requested.
fn order_ports<'a>(
    ports: &'a [String],
    sort_mode: SortMode,
    aggregation: &AggregationResult,
) -> Vec<&'a str> {
    let mut ordered: Vec<&str> = ports.iter().map(String::as_str).collect();
    ordered.sort_unstable();
    match sort_mode {
        SortMode::Alphabetical => {}
        SortMode::HighToLow => ordered.sort_by_key(|port| Reverse(aggregation.port_total(port))),
        SortMode::LowToHigh => ordered.sort_by_key(|port| aggregation.port_total(port)),
    }
    ordered
}

fn port_cells(
    port: &str,
    slots: &[TimeSlot],
    filter: &FilterState,
    aggregation: &AggregationResult,
) -> Vec<HeatCell> {
    slots
        .iter()
        .enumerate()
        .map(|(column, slot)| {
            let value = aggregation.cell(port, *slot);
            let level = color_level(value, aggregation.min_value, aggregation.max_value);
            HeatCell {
                column,
                value,
                level,
                color: level_color(level),
                tooltip: tooltip(port, *slot, value, &filter.years),
            }
        })
        .collect()
}

fn tooltip(port: &str, slot: TimeSlot, value: u64, years: &[i32]) -> String {
    let month = slot.month.label();
    let value = format_count(value);
    match (slot.year, years) {
        (Some(year), _) => format!("{port} | {month} {year} | {value}"),
        (None, [year]) => format!("{port} | {month} {year} | {value}"),
        (None, []) => format!("{port} | {month} | {value}"),
        (None, years) => {
            let years = years
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{port} | {month} ({years}) | {value}")
        }
    }
}

/// Render an integer with comma thousands separators.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Vertical center of `span` rows starting at body row `start`.
fn block_midpoint(start: usize, span: usize) -> u32 {
    HEADER_HEIGHT + start as u32 * ROW_HEIGHT + span as u32 * ROW_HEIGHT / 2
}
