use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(&state.static_dir)
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    let app = Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .route("/api/controls", get(routes::heatmap::get_controls))
        .route("/api/heatmap", get(routes::heatmap::get_heatmap))
        .route("/api/actions", post(routes::heatmap::post_action))
        .route("/api/overview", get(routes::overview::get_overview))
        .route("/api/map/timeline", get(routes::overview::get_map_timeline))
        .route("/api/map/frame", get(routes::overview::get_map_frame));

    app.layer(CompressionLayer::new())
        .fallback_service(static_assets)
        .with_state(state)
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success()
        && let Some(cache_control) = cache_control_for_path(&path)
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control),
        );
    }

    response
}

fn cache_control_for_path(path: &str) -> Option<&'static str> {
    // The CSV is replaced in place when the data is refreshed.
    path.ends_with(".csv").then_some("no-cache")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn only_the_dataset_gets_a_cache_rule() {
        assert_eq!(cache_control_for_path("/history.csv"), Some("no-cache"));
        assert_eq!(cache_control_for_path("/data/border.csv"), Some("no-cache"));
        assert_eq!(cache_control_for_path("/"), None);
        assert_eq!(cache_control_for_path("/index.html"), None);
        assert_eq!(cache_control_for_path("/app-0123abcd.js"), None);
        assert_eq!(cache_control_for_path("/lib/d3.v7.min.js"), None);
        assert_eq!(cache_control_for_path("/us-states.geojson"), None);
    }

    #[tokio::test]
    async fn static_files_are_served_with_cache_headers() {
        let dir = tempfile::tempdir().expect("create static dir");
        std::fs::write(dir.path().join("index.html"), "<h1>Border crossings</h1>")
            .expect("write index");
        std::fs::write(dir.path().join("history.csv"), "Port Name,Date\n")
            .expect("write dataset");
        let state = AppState::new(
            PathBuf::from("unused.csv"),
            dir.path().to_path_buf(),
            Duration::ZERO,
        );
        let app = build_app(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/history.csv")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("dataset request");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-cache")
        );

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/index.html")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("page request");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/controls")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("controls request");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
