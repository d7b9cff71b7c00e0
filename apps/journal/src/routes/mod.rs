pub mod health;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::journal::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = state
        .config
        .app
        .allowed_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
        .map(cors_layer);

    let router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/entry", get(handlers::handle_get_entry))
        .route(
            "/api/v1/entry/blocks/:block_id",
            post(handlers::handle_save_block),
        )
        .route("/api/v1/entries/:date", get(handlers::handle_get_record))
        .route("/api/v1/history", get(handlers::handle_history))
        .route("/api/v1/stats", get(handlers::handle_stats))
        .with_state(state);

    // Without a configured origin, browsers only reach the API from its own origin.
    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::Local;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::fields::RawValue;
    use crate::store::RecordStore;

    const CONFIG: &str = r#"
app:
  title: Wellness
blocks:
  - id: sleep
    title: Sleep
    n_cols: 2
    fields:
      - { name: sleep_hours, label: Hours, type: number, subtype: float }
      - { name: sleep_quality, label: Quality, type: slider, min: 1, max: 5, default: 3 }
  - id: biometrics
    title: Biometrics
    fields:
      - { name: hrv, label: HRV, type: number, subtype: int, allow_none: true }
      - { name: gym, label: Gym, type: checkbox }
"#;

    struct Harness {
        _dir: TempDir,
        store: RecordStore,
        router: Router,
    }

    fn harness() -> Harness {
        harness_with(Config::from_yaml(CONFIG).unwrap())
    }

    fn harness_with(config: Config) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path().join("wellness_data.csv"));
        let state = AppState {
            config: Arc::new(config),
            store: store.clone(),
        };
        Harness {
            _dir: dir,
            store,
            router: build_router(state),
        }
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let (status, body) = send(&h.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_empty_journal() {
        let h = harness();

        let (status, body) = send(&h.router, Method::GET, "/api/v1/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No data yet.");

        let (status, body) = send(&h.router, Method::GET, "/api/v1/entries/2024-01-01", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"], Value::Null);

        let (status, body) = send(&h.router, Method::GET, "/api/v1/entry", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blocks"][0]["fields"][1]["value"], 3);
    }

    #[tokio::test]
    async fn test_block_saves_merge_into_one_day() {
        let h = harness();
        let today = Local::now().date_naive();

        let (status, body) = send(
            &h.router,
            Method::POST,
            "/api/v1/entry/blocks/sleep",
            Some(json!({ "values": { "sleep_hours": 7.5, "sleep_quality": 4 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Sleep saved.");

        let (status, _) = send(
            &h.router,
            Method::POST,
            "/api/v1/entry/blocks/biometrics",
            Some(json!({ "values": { "gym": true }, "not_measured": ["hrv"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let record = h.store.get(today).unwrap().expect("today was saved");
        assert_eq!(record.get("sleep_hours"), Some(&RawValue::Float(7.5)));
        assert_eq!(record.get("sleep_quality"), Some(&RawValue::Int(4)));
        assert_eq!(record.get("gym"), Some(&RawValue::Bool(true)));
        assert_eq!(record.get("hrv"), None);
        assert_eq!(h.store.load_all().unwrap().len(), 1);

        let uri = format!("/api/v1/entries/{}", today.format("%Y-%m-%d"));
        let (_, body) = send(&h.router, Method::GET, &uri, None).await;
        assert_eq!(body["record"]["sleep_hours"], 7.5);
        assert_eq!(body["record"]["sleep_quality"], 4);

        let (_, body) = send(&h.router, Method::GET, "/api/v1/entry", None).await;
        assert_eq!(body["blocks"][0]["fields"][0]["value"], 7.5);
        assert_eq!(body["blocks"][1]["fields"][0]["not_measured"], true);

        let (_, body) = send(&h.router, Method::GET, "/api/v1/history", None).await;
        assert_eq!(body["entries"].as_array().map(Vec::len), Some(1));
        assert!(body["entries"][0].get("overall_vibe").is_none());
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let h = harness();

        let (status, body) = send(
            &h.router,
            Method::POST,
            "/api/v1/entry/blocks/dreams",
            Some(json!({ "values": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, body) = send(
            &h.router,
            Method::POST,
            "/api/v1/entry/blocks/sleep",
            Some(json!({ "values": { "sleep_quality": 9 } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_SUBMISSION");

        let (status, _) = send(
            &h.router,
            Method::POST,
            "/api/v1/entry/blocks/sleep",
            Some(json!({ "values": { "gym": true } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&h.router, Method::GET, "/api/v1/entries/yesterday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(h.store.load_all().unwrap().is_empty());
    }

    async fn history_from(router: &Router, origin: &str) -> (StatusCode, Option<HeaderValue>) {
        let request = Request::builder()
            .uri("/api/v1/history")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let allowed = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned();
        (response.status(), allowed)
    }

    #[tokio::test]
    async fn test_cross_origin_reads_are_not_allowed_by_default() {
        let h = harness();
        let (status, allowed) = history_from(&h.router, "https://evil.example").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(allowed, None);
    }

    #[tokio::test]
    async fn test_only_the_configured_origin_is_allowed() {
        let mut config = Config::from_yaml(CONFIG).unwrap();
        config.app.allowed_origin = Some("http://localhost:3000".into());
        let h = harness_with(config);

        let (_, allowed) = history_from(&h.router, "http://localhost:3000").await;
        assert_eq!(allowed, Some(HeaderValue::from_static("http://localhost:3000")));

        let (_, allowed) = history_from(&h.router, "https://evil.example").await;
        assert_eq!(allowed, None);
    }

    #[tokio::test]
    async fn test_stats_placeholder() {
        let h = harness();
        let (status, body) = send(&h.router, Method::GET, "/api/v1/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Stats (coming soon)");
    }
}
