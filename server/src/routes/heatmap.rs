use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use border_traffic_shared::dashboard::Controls;
use border_traffic_shared::{Action, DashboardError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::routes::api::{
    error_response, if_none_match_matches, json_response, not_modified_response,
    unavailable_response,
};
use crate::state::{AppState, DatasetSlot};

const HEATMAP_CACHE_CONTROL: &str = "no-cache";

#[derive(Debug, Serialize)]
pub struct ActionOutcome {
    pub action: &'static str,
    /// Fingerprint of the applied filter after the action.
    pub fingerprint: u32,
    pub controls: Controls,
}

fn heatmap_etag(fingerprint: u32) -> String {
    format!("\"heatmap-{fingerprint:08x}\"")
}

pub async fn get_controls(State(state): State<AppState>) -> Response {
    let slot = state.dataset.lock().await;
    if let Some(response) = unavailable_response(&slot) {
        return response;
    }
    let DatasetSlot::Ready { dashboard, .. } = &*slot else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    json_response(&dashboard.controls(), "no-store", None)
}

/// Render plan for the applied filter. The ETag follows the filter
/// fingerprint, so an unchanged view answers 304.
pub async fn get_heatmap(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.observability.record_heatmap_request();

    let plan = {
        let mut slot = state.dataset.lock().await;
        if let Some(response) = unavailable_response(&slot) {
            return response;
        }
        let DatasetSlot::Ready { dashboard, .. } = &mut *slot else {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        };

        let etag = heatmap_etag(dashboard.filter().fingerprint());
        if if_none_match_matches(&headers, &etag) {
            state.observability.record_heatmap_not_modified();
            return not_modified_response(HEATMAP_CACHE_CONTROL, Some(etag.as_str()));
        }

        state
            .observability
            .record_aggregation_lookup(dashboard.is_cached());
        dashboard.render()
    };

    let etag = heatmap_etag(plan.fingerprint);
    json_response(&plan, HEATMAP_CACHE_CONTROL, Some(etag.as_str()))
}

/// Dispatch one action.
///
/// Apply holds an exclusive flag for its whole duration: a second apply
/// arriving meanwhile gets 409. Before recomputing, the handler yields for
/// the configured pause without holding the dashboard lock.
pub async fn post_action(State(state): State<AppState>, Json(action): Json<Action>) -> Response {
    state.observability.record_action();
    let kind = action.kind();

    let _apply_guard = if action.is_apply() {
        let Some(guard) = state.begin_apply() else {
            state.observability.record_rejected_apply();
            debug!("apply rejected while another apply is running");
            return error_response(
                StatusCode::CONFLICT,
                "busy",
                "an apply is already in progress",
            );
        };
        if !state.recompute_yield.is_zero() {
            tokio::time::sleep(state.recompute_yield).await;
        }
        Some(guard)
    } else {
        None
    };

    let mut slot = state.dataset.lock().await;
    if let Some(response) = unavailable_response(&slot) {
        return response;
    }
    let DatasetSlot::Ready { dashboard, .. } = &mut *slot else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let refresh = action.changes_filter();
    match dashboard.dispatch(action) {
        Ok(()) => {
            if refresh {
                state
                    .observability
                    .record_aggregation_lookup(dashboard.is_cached());
                let aggregation = dashboard.aggregation();
                debug!(
                    action = kind,
                    cells = aggregation.cell_count(),
                    recomputations = dashboard.recomputations(),
                    "filter refreshed"
                );
            }
            let outcome = ActionOutcome {
                action: kind,
                fingerprint: dashboard.filter().fingerprint(),
                controls: dashboard.controls(),
            };
            json_response(&outcome, "no-store", None)
        }
        Err(e @ DashboardError::EmptyFilterSelection { .. }) => {
            state.observability.record_empty_selection();
            info!(error = %e, "apply rejected");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "status": "empty_selection",
                    "error": "No years selected",
                    "detail": e.to_string(),
                    "controls": dashboard.controls(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            warn!(action = kind, error = %e, "action failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "error", &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use axum::http::header;
    use border_traffic_shared::Dashboard;
    use reqwest::StatusCode;

    use crate::routes::api::tests::{raw_row, ready_state, spawn_test_server};
    use crate::state::AppState;

    async fn post_action(
        client: &reqwest::Client,
        base_url: &str,
        body: serde_json::Value,
    ) -> reqwest::Response {
        client
            .post(format!("{base_url}/api/actions"))
            .json(&body)
            .send()
            .await
            .expect("action request")
    }

    #[tokio::test]
    async fn heatmap_is_unavailable_while_loading() {
        let state = AppState::new(
            PathBuf::from("slow.csv"),
            PathBuf::from("public"),
            Duration::ZERO,
        );
        let (addr, server_handle) = spawn_test_server(state).await;

        let response = reqwest::get(format!("http://{addr}/api/heatmap"))
            .await
            .expect("heatmap request");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = response
            .json::<serde_json::Value>()
            .await
            .expect("parse body");
        assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("loading"));
        assert_eq!(
            body.get("error").and_then(|v| v.as_str()),
            Some("Loading data...")
        );

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn heatmap_etag_answers_not_modified_until_the_filter_changes() {
        let state = ready_state().await;
        let observability = state.observability.clone();
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let first = client
            .get(format!("{base_url}/api/heatmap"))
            .send()
            .await
            .expect("heatmap request");
        assert_eq!(first.status(), StatusCode::OK);
        let etag = first
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .expect("etag header");
        let plan = first
            .json::<serde_json::Value>()
            .await
            .expect("parse plan");
        assert_eq!(plan.get("row_height").and_then(|v| v.as_u64()), Some(20));
        assert_eq!(plan.get("column_count").and_then(|v| v.as_u64()), Some(24));

        let cached = client
            .get(format!("{base_url}/api/heatmap"))
            .header(header::IF_NONE_MATCH, &etag)
            .send()
            .await
            .expect("conditional heatmap request");
        assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);

        post_action(
            &client,
            &base_url,
            serde_json::json!({"type": "toggle_granularity"}),
        )
        .await
        .error_for_status()
        .expect("toggle status");

        let changed = client
            .get(format!("{base_url}/api/heatmap"))
            .header(header::IF_NONE_MATCH, &etag)
            .send()
            .await
            .expect("heatmap after toggle");
        assert_eq!(changed.status(), StatusCode::OK);
        let plan = changed
            .json::<serde_json::Value>()
            .await
            .expect("parse plan");
        assert_eq!(plan.get("column_count").and_then(|v| v.as_u64()), Some(12));

        let snapshot = observability.snapshot();
        assert_eq!(snapshot.heatmap_requests_total, 3);
        assert_eq!(snapshot.heatmap_not_modified_total, 1);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn staged_controls_only_reach_the_heatmap_on_apply() {
        let state = ready_state().await;
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let outcome = post_action(
            &client,
            &base_url,
            serde_json::json!({"type": "set_year_start", "year": 2021}),
        )
        .await
        .json::<serde_json::Value>()
        .await
        .expect("parse outcome");
        let controls = outcome.get("controls").expect("controls");
        assert_eq!(
            controls.get("year_readout").and_then(|v| v.as_str()),
            Some("2021 – 2021")
        );
        assert_eq!(
            controls
                .get("applied")
                .and_then(|v| v.get("years"))
                .and_then(|v| v.as_array())
                .map(Vec::len),
            Some(2)
        );

        let applied = post_action(&client, &base_url, serde_json::json!({"type": "apply"}))
            .await
            .error_for_status()
            .expect("apply status")
            .json::<serde_json::Value>()
            .await
            .expect("parse outcome");
        assert_eq!(
            applied
                .get("controls")
                .and_then(|v| v.get("applied"))
                .and_then(|v| v.get("years")),
            Some(&serde_json::json!([2021]))
        );

        let plan = client
            .get(format!("{base_url}/api/heatmap"))
            .send()
            .await
            .expect("heatmap request")
            .json::<serde_json::Value>()
            .await
            .expect("parse plan");
        assert_eq!(plan.get("years"), Some(&serde_json::json!([2021])));

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn apply_without_data_years_is_unprocessable() {
        let state = ready_state().await;
        let rows = [
            raw_row("Blaine", "Washington", "Jan 2018", "Trucks", "1"),
            raw_row("Blaine", "Washington", "Jan 2020", "Trucks", "1"),
        ];
        state.install(Dashboard::from_rows(&rows)).await;
        let observability = state.observability.clone();
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        post_action(
            &client,
            &base_url,
            serde_json::json!({"type": "set_year_start", "year": 2019}),
        )
        .await;
        post_action(
            &client,
            &base_url,
            serde_json::json!({"type": "set_year_end", "year": 2019}),
        )
        .await;

        let rejected = post_action(&client, &base_url, serde_json::json!({"type": "apply"})).await;
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = rejected
            .json::<serde_json::Value>()
            .await
            .expect("parse rejection");
        assert_eq!(
            body.get("error").and_then(|v| v.as_str()),
            Some("No years selected")
        );
        assert_eq!(
            body.get("controls")
                .and_then(|v| v.get("applied"))
                .and_then(|v| v.get("years")),
            Some(&serde_json::json!([2018, 2020]))
        );
        assert_eq!(observability.snapshot().empty_selections_total, 1);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn overlapping_apply_is_rejected_with_conflict() {
        let state = ready_state().await;
        let guard = state.begin_apply().expect("claim apply flag");
        let observability = state.observability.clone();
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let response = post_action(&client, &base_url, serde_json::json!({"type": "apply"})).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(observability.snapshot().rejected_applies_total, 1);

        drop(guard);
        let response = post_action(&client, &base_url, serde_json::json!({"type": "apply"})).await;
        assert_eq!(response.status(), StatusCode::OK);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn drill_actions_reshape_the_plan() {
        let state = ready_state().await;
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        post_action(
            &client,
            &base_url,
            serde_json::json!({"type": "click_region", "region": "Pacific"}),
        )
        .await
        .error_for_status()
        .expect("drill status");

        let plan = client
            .get(format!("{base_url}/api/heatmap"))
            .send()
            .await
            .expect("heatmap request")
            .json::<serde_json::Value>()
            .await
            .expect("parse plan");
        let rows = plan
            .get("rows")
            .and_then(|v| v.as_array())
            .expect("rows array");
        let kinds: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("kind").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(
            kinds.iter().filter(|kind| **kind == "collapsed_region").count(),
            2
        );
        assert_eq!(kinds.iter().filter(|kind| **kind == "port").count(), 2);

        let response = client
            .post(format!("{base_url}/api/actions"))
            .json(&serde_json::json!({"type": "teleport"}))
            .send()
            .await
            .expect("bad action request");
        assert!(response.status().is_client_error());

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn drill_into_a_state_outside_the_drilled_region_is_ignored() {
        let state = ready_state().await;
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        post_action(
            &client,
            &base_url,
            serde_json::json!({"type": "click_region", "region": "South"}),
        )
        .await
        .error_for_status()
        .expect("drill status");

        let outcome = post_action(
            &client,
            &base_url,
            serde_json::json!({"type": "click_state", "state": "Washington"}),
        )
        .await
        .error_for_status()
        .expect("foreign state status")
        .json::<serde_json::Value>()
        .await
        .expect("parse outcome");
        let applied = outcome
            .pointer("/controls/applied")
            .expect("applied filter");
        assert_eq!(applied.get("drill_region").and_then(|v| v.as_str()), Some("South"));
        assert!(applied.get("drill_state").is_none());

        let plan = client
            .get(format!("{base_url}/api/heatmap"))
            .send()
            .await
            .expect("heatmap request")
            .json::<serde_json::Value>()
            .await
            .expect("parse plan");
        let ports: Vec<&str> = plan
            .get("rows")
            .and_then(|v| v.as_array())
            .expect("rows array")
            .iter()
            .filter_map(|row| row.get("port").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(ports, ["Laredo"]);

        server_handle.abort();
        let _ = server_handle.await;
    }
}
