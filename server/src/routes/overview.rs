use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use border_traffic_shared::overview::{EventAnnotation, YearTotal, sparse_label_indices};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_TIMELINE_WIDTH_PX, TIMELINE_LABEL_MIN_SPACING_PX};
use crate::routes::api::{error_response, json_response, unavailable_response};
use crate::state::{AppState, DatasetSlot};

// Derived views never change after load.
const DERIVED_CACHE_CONTROL: &str = "public, max-age=300";

#[derive(Debug, Default, Deserialize)]
pub struct OverviewQuery {
    /// Cumulative slider position; all years when absent.
    pub through: Option<i32>,
}

#[derive(Debug, Serialize)]
struct OverviewBody<'a> {
    points: &'a [YearTotal],
    annotations: &'a [EventAnnotation],
    first_year: Option<i32>,
    last_year: Option<i32>,
    max_total: u64,
    y_axis_max: f64,
    annotation_y: f64,
}

pub async fn get_overview(
    State(state): State<AppState>,
    Query(query): Query<OverviewQuery>,
) -> Response {
    let slot = state.dataset.lock().await;
    if let Some(response) = unavailable_response(&slot) {
        return response;
    }
    let DatasetSlot::Ready { dashboard, .. } = &*slot else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let Some(series) = dashboard.overview() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no_data",
            "no data found",
        );
    };

    let points = match query.through {
        Some(year) => series.points_through(year),
        None => series.points.as_slice(),
    };
    let body = OverviewBody {
        points,
        annotations: &series.annotations,
        first_year: series.points.first().map(|p| p.year),
        last_year: series.points.last().map(|p| p.year),
        max_total: series.max_total,
        y_axis_max: series.y_axis_max,
        annotation_y: series.annotation_y,
    };
    json_response(&body, DERIVED_CACHE_CONTROL, None)
}

#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    /// Pixel width of the slider track used to thin out labels.
    pub width: Option<f64>,
}

#[derive(Debug, Serialize)]
struct TimelineBody {
    frame_count: usize,
    labels: Vec<String>,
    /// Indices into `labels` to draw on the track.
    label_indices: Vec<usize>,
}

pub async fn get_map_timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Response {
    let slot = state.dataset.lock().await;
    if let Some(response) = unavailable_response(&slot) {
        return response;
    }
    let DatasetSlot::Ready { dashboard, .. } = &*slot else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let timeline = dashboard.timeline();
    let width = query
        .width
        .filter(|width| width.is_finite() && *width > 0.0)
        .unwrap_or(DEFAULT_TIMELINE_WIDTH_PX);
    let body = TimelineBody {
        frame_count: timeline.len(),
        labels: timeline.labels(),
        label_indices: sparse_label_indices(timeline.len(), width, TIMELINE_LABEL_MIN_SPACING_PX),
    };
    json_response(&body, DERIVED_CACHE_CONTROL, None)
}

#[derive(Debug, Deserialize)]
pub struct FrameQuery {
    pub index: usize,
}

pub async fn get_map_frame(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
) -> Response {
    let slot = state.dataset.lock().await;
    if let Some(response) = unavailable_response(&slot) {
        return response;
    }
    let DatasetSlot::Ready { dashboard, .. } = &*slot else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    match dashboard.timeline().frame(query.index) {
        Some(frame) => json_response(&frame, DERIVED_CACHE_CONTROL, None),
        None => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!(
                "frame {} is out of range ({} frames)",
                query.index,
                dashboard.timeline().len()
            ),
        ),
    }
}
