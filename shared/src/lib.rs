pub mod aggregate;
pub mod colors;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod overview;
pub mod record;
pub mod regions;
pub mod render;
pub mod view;

pub use aggregate::{AggregationCache, AggregationResult, TimeSlot};
pub use dashboard::{Action, Controls, Dashboard};
pub use error::DashboardError;
pub use filter::{FilterState, Granularity, MeasureSelection, SortMode};
pub use hierarchy::{HierarchyIndex, Scope};
pub use overview::{MapFrame, MapTimeline, OverviewSeries};
pub use record::{Month, RawRow, RecordStore, TrafficRecord};
pub use render::HeatmapPlan;
