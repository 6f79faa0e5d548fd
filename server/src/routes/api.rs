use std::fmt::Write as _;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

use crate::state::{AppState, DatasetSlot, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Dataset figures reported by health and metrics.
#[derive(Debug, Clone, Copy, Default)]
struct DatasetGauges {
    ready: bool,
    records: usize,
    skipped_rows: usize,
    malformed_values: usize,
    ports: usize,
    recomputations: u64,
}

impl DatasetGauges {
    fn of(slot: &DatasetSlot) -> Self {
        let DatasetSlot::Ready { dashboard, .. } = slot else {
            return Self::default();
        };
        let stats = dashboard.ingest_stats();
        Self {
            ready: true,
            records: stats.accepted,
            skipped_rows: stats.skipped_rows,
            malformed_values: stats.malformed_values,
            ports: dashboard.hierarchy().port_count(),
            recomputations: dashboard.recomputations(),
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (dataset_status, loaded_at, message, gauges) = {
        let slot = state.dataset.lock().await;
        let loaded_at = match &*slot {
            DatasetSlot::Ready { loaded_at, .. } => Some(loaded_at.to_rfc3339()),
            _ => None,
        };
        let message = match &*slot {
            DatasetSlot::Failed(e) => Some(e.to_string()),
            _ => None,
        };
        (slot.status(), loaded_at, message, DatasetGauges::of(&slot))
    };
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "dataset": {
            "status": dataset_status,
            "path": state.dataset_path.display().to_string(),
            "loaded_at": loaded_at,
            "message": message,
            "records": gauges.records,
            "skipped_rows": gauges.skipped_rows,
            "malformed_values": gauges.malformed_values,
            "ports": gauges.ports,
        },
        "observability": {
            "heatmap_requests_total": observability.heatmap_requests_total,
            "heatmap_not_modified_total": observability.heatmap_not_modified_total,
            "aggregation_cache_hits_total": observability.aggregation_cache_hits_total,
            "aggregation_cache_misses_total": observability.aggregation_cache_misses_total,
            "aggregation_recomputations_total": gauges.recomputations,
            "actions_total": observability.actions_total,
            "rejected_applies_total": observability.rejected_applies_total,
            "empty_selections_total": observability.empty_selections_total,
        }
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let gauges = DatasetGauges::of(&*state.dataset.lock().await);
    let observability = state.observability.snapshot();

    let body = render_prometheus_metrics(gauges, observability);

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn write_metric(body: &mut String, name: &str, kind: &str, help: &str, value: impl std::fmt::Display) {
    let _ = writeln!(body, "# HELP {name} {help}");
    let _ = writeln!(body, "# TYPE {name} {kind}");
    let _ = writeln!(body, "{name} {value}");
}

fn render_prometheus_metrics(gauges: DatasetGauges, observability: ObservabilitySnapshot) -> String {
    let mut body = String::new();
    write_metric(
        &mut body,
        "border_traffic_dataset_ready",
        "gauge",
        "Whether the dataset is loaded (1 or 0).",
        u8::from(gauges.ready),
    );
    write_metric(
        &mut body,
        "border_traffic_records",
        "gauge",
        "Normalized traffic records held in memory.",
        gauges.records,
    );
    write_metric(
        &mut body,
        "border_traffic_skipped_rows",
        "gauge",
        "CSV rows dropped during ingestion.",
        gauges.skipped_rows,
    );
    write_metric(
        &mut body,
        "border_traffic_malformed_values",
        "gauge",
        "Rows whose value was unparsable and recorded as zero.",
        gauges.malformed_values,
    );
    write_metric(
        &mut body,
        "border_traffic_ports",
        "gauge",
        "Distinct ports in the hierarchy.",
        gauges.ports,
    );
    write_metric(
        &mut body,
        "border_traffic_aggregation_recomputations_total",
        "counter",
        "Full record scans performed by the aggregation cache.",
        gauges.recomputations,
    );
    write_metric(
        &mut body,
        "border_traffic_heatmap_requests_total",
        "counter",
        "Total /api/heatmap requests.",
        observability.heatmap_requests_total,
    );
    write_metric(
        &mut body,
        "border_traffic_heatmap_not_modified_total",
        "counter",
        "Heatmap requests answered with 304 Not Modified.",
        observability.heatmap_not_modified_total,
    );
    write_metric(
        &mut body,
        "border_traffic_aggregation_cache_hits_total",
        "counter",
        "Aggregation lookups served from cache.",
        observability.aggregation_cache_hits_total,
    );
    write_metric(
        &mut body,
        "border_traffic_aggregation_cache_misses_total",
        "counter",
        "Aggregation lookups that rescanned the records.",
        observability.aggregation_cache_misses_total,
    );
    write_metric(
        &mut body,
        "border_traffic_actions_total",
        "counter",
        "Total dashboard actions received.",
        observability.actions_total,
    );
    write_metric(
        &mut body,
        "border_traffic_rejected_applies_total",
        "counter",
        "Apply actions rejected while another apply was running.",
        observability.rejected_applies_total,
    );
    write_metric(
        &mut body,
        "border_traffic_empty_selections_total",
        "counter",
        "Apply actions whose year range held no data years.",
        observability.empty_selections_total,
    );
    body
}

/// Serialize `value` into a JSON response with cache headers.
pub(crate) fn json_response<T: Serialize>(
    value: &T,
    cache_control: &'static str,
    etag: Option<&str>,
) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => json_bytes_response(Bytes::from(body), cache_control, etag),
        Err(e) => {
            warn!(error = %e, "failed to serialize response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) fn json_bytes_response(
    body: Bytes,
    cache_control: &'static str,
    etag: Option<&str>,
) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

pub(crate) fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

/// JSON error body `{"status": .., "error": ..}` with the given code.
pub(crate) fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": kind,
            "error": message,
        })),
    )
        .into_response()
}

/// 503 explaining why no dashboard is available, or `None` when it is.
pub(crate) fn unavailable_response(slot: &DatasetSlot) -> Option<Response> {
    let message = match slot {
        DatasetSlot::Ready { .. } => return None,
        DatasetSlot::Loading => "Loading data...".to_owned(),
        DatasetSlot::Failed(e) => e.to_string(),
    };
    Some(error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        slot.status(),
        &message,
    ))
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

pub(crate) fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
