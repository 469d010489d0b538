use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use kbc_core::adapter::{AdapterConfig, AdapterRegistry};
use kbc_core::cache::{KeyValueStore, MemoryStore, RedisStore, ScheduleCache};
use kbc_core::service::ScheduleService;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod route;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScheduleService>,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/calendar.ics", get(route::calendar::handler))
        .route("/api/schedule", get(route::schedule::handler))
        .route("/api/addresses", get(route::addresses::handler))
        .route("/api/sources", get(route::sources::handler))
        .route("/api/health", get(route::health::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();
    let registry = AdapterRegistry::new(&AdapterConfig {
        webdriver_url: config.webdriver_url.clone(),
    });
    let store: Arc<dyn KeyValueStore> = match RedisStore::new(&config.redis_url) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::warn!(error = %err, "cache store unavailable, using in-memory fallback");
            Arc::new(MemoryStore::default())
        }
    };
    let service = Arc::new(ScheduleService::new(registry, ScheduleCache::new(store)));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app(AppState { service }).into_make_service())
        .await
        .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::NaiveDate;
    use kbc_core::error::AdapterError;
    use kbc_core::schedule::ScheduleEntry;
    use tower::ServiceExt;

    struct StubAdapter;

    #[async_trait]
    impl kbc_core::adapter::SourceAdapter for StubAdapter {
        fn id(&self) -> &'static str {
            "stub"
        }

        fn name(&self) -> &'static str {
            "Stub Council"
        }

        async fn fetch_schedule(
            &self,
            _postcode: &str,
            _property: &str,
        ) -> Result<Vec<ScheduleEntry>, AdapterError> {
            Ok(vec![
                ScheduleEntry {
                    collection_type: "Refuse".to_string(),
                    date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                },
                ScheduleEntry {
                    collection_type: "Recycling".to_string(),
                    date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                },
            ])
        }
    }

    struct EmptyAdapter;

    #[async_trait]
    impl kbc_core::adapter::SourceAdapter for EmptyAdapter {
        fn id(&self) -> &'static str {
            "empty"
        }

        fn name(&self) -> &'static str {
            "Empty Council"
        }

        async fn fetch_schedule(
            &self,
            _postcode: &str,
            _property: &str,
        ) -> Result<Vec<ScheduleEntry>, AdapterError> {
            Ok(vec![])
        }
    }

    fn test_app() -> Router {
        let registry = AdapterRegistry::from_adapters(vec![
            Arc::new(StubAdapter),
            Arc::new(EmptyAdapter),
        ]);
        let service = Arc::new(ScheduleService::new(
            registry,
            ScheduleCache::new(Arc::new(MemoryStore::default())),
        ));
        app(AppState { service })
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_sources_listing() {
        let response = test_app()
            .oneshot(Request::get("/api/sources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains(r#""id":"stub""#));
        assert!(body.contains(r#""name":"Stub Council""#));
    }

    #[tokio::test]
    async fn test_calendar_requires_parameters() {
        let response = test_app()
            .oneshot(
                Request::get("/calendar.ics?source=stub")
                    .header(header::HOST, "bins.example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("Missing required parameters"));
    }

    #[tokio::test]
    async fn test_calendar_rejects_unknown_source() {
        let response = test_app()
            .oneshot(
                Request::get("/calendar.ics?source=atlantis&postcode=ME1%201AA&property=42")
                    .header(header::HOST, "bins.example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("Unknown source"));
    }

    #[tokio::test]
    async fn test_calendar_feed_round_trip() {
        let response = test_app()
            .oneshot(
                Request::get("/calendar.ics?source=stub&postcode=ME1%201AA&property=42")
                    .header(header::HOST, "bins.example.org:8008")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/calendar; charset=utf-8"
        );
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
        let body = body_string(response).await;
        assert!(body.starts_with("BEGIN:VCALENDAR"));
        // The UID domain comes from the Host header, port stripped.
        assert!(body.contains("@bins.example.org"));
    }

    #[tokio::test]
    async fn test_calendar_download_disposition() {
        let response = test_app()
            .oneshot(
                Request::get(
                    "/calendar.ics?source=stub&postcode=ME1%201AA&property=42&download",
                )
                .header(header::HOST, "bins.example.org")
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"stub-bins.ics\""
        );
    }

    #[tokio::test]
    async fn test_calendar_404_when_no_data() {
        let response = test_app()
            .oneshot(
                Request::get("/calendar.ics?source=empty&postcode=ME1%201AA&property=42")
                    .header(header::HOST, "bins.example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_schedule_endpoint_reports_cache_state() {
        let app = test_app();
        let first = app
            .clone()
            .oneshot(
                Request::get("/api/schedule?source=stub&postcode=ME1%201AA&property=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert!(body_string(first).await.contains(r#""cached":false"#));

        let second = app
            .oneshot(
                Request::get("/api/schedule?source=stub&postcode=ME1%201AA&property=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_string(second).await;
        assert!(body.contains(r#""cached":true"#));
        assert!(body.contains(r#""collectionType":"Recycling""#));
        assert!(body.contains(r#""date":"2025-01-15""#));
    }

    #[tokio::test]
    async fn test_addresses_endpoint_without_capability() {
        let response = test_app()
            .oneshot(
                Request::get("/api/addresses?source=stub&postcode=ME1%201AA")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("Address lookup not supported"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains(r#""status":"ok""#));
    }
}
