pub mod config;
mod error;
mod metrics;
mod routes;
mod state;
pub mod store;

use std::process;
use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use toggled_lib::FlagService;
use tower_http::compression::CompressionLayer;
use tracing::{error, info};

use self::config::ToggledConfig;
use self::metrics::{handle_metrics, track_metrics};
use self::routes::{
    handle_get_flag, handle_health, handle_list_flags, handle_readyz, handle_upsert_flag,
};
use self::state::AppState;

/// Build the HTTP router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/readyz", get(handle_readyz))
        .route("/metrics", get(handle_metrics))
        .route("/flags", get(handle_list_flags).post(handle_upsert_flag))
        .route("/flags/{name}", get(handle_get_flag))
        .layer(middleware::from_fn(track_metrics))
        .layer(CompressionLayer::new())
        .with_state(state)
}

pub async fn run_serve(config: ToggledConfig) {
    let server = config.server;

    let store = match store::open_store(&server) {
        Ok(store) => store,
        Err(e) => {
            error!(
                storage = server.storage.as_str(),
                data_dir = %server.data_dir,
                error = %e,
                "failed to open store"
            );
            process::exit(1);
        }
    };
    metrics::metrics()
        .storage_backend
        .with_label_values(&[server.storage.as_str()])
        .set(1);

    let state = Arc::new(AppState::new(FlagService::new(store), server.storage));
    let app = router(state);

    let addr = format!("{}:{}", server.hostname, server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(addr = %addr, storage = server.storage.as_str(), "serving flags");

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");

        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }

        #[cfg(not(unix))]
        ctrl_c.await.ok();

        info!("shutdown signal received, finishing in-flight requests");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "server error");
        process::exit(1);
    }

    info!("server stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use toggled_lib::MemoryStore;
    use tower::ServiceExt;

    use super::config::StorageBackend;

    fn test_router() -> Router {
        let service = FlagService::new(Arc::new(MemoryStore::new()));
        router(Arc::new(AppState::new(service, StorageBackend::Memory)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_flag(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/flags")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_router();
        let (status, body) = send(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_upsert_then_get_decision() {
        let app = test_router();
        let (status, body) = send(
            &app,
            post_flag(serde_json::json!({"name": "new-onboarding", "enabled": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "ok", "flag": "new-onboarding"}));

        let (status, body) = send(&app, get_req("/flags/new-onboarding")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "name": "new-onboarding",
                "enabled": true,
                "rollout": 100,
                "environment": "prod",
                "active": true,
            })
        );
    }

    #[tokio::test]
    async fn test_environment_query() {
        let app = test_router();
        send(
            &app,
            post_flag(serde_json::json!({
                "name": "debug-panel",
                "enabled": true,
                "rollout": 0,
                "environment": "dev",
            })),
        )
        .await;

        let (status, body) = send(&app, get_req("/flags/debug-panel?environment=dev")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["environment"], "dev");
        assert_eq!(body["active"], false);

        let (status, _) = send(&app, get_req("/flags/debug-panel")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rollout_out_of_range_is_bad_request() {
        let app = test_router();
        let (status, body) = send(
            &app,
            post_flag(serde_json::json!({"name": "x", "enabled": true, "rollout": 101})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("101"));

        let (_, body) = send(&app, get_req("/flags")).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_unknown_flag_is_not_found() {
        let app = test_router();
        let (status, body) = send(&app, get_req("/flags/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_list_flags() {
        let app = test_router();
        for (name, enabled) in [("one", true), ("two", false)] {
            send(
                &app,
                post_flag(serde_json::json!({"name": name, "enabled": enabled, "rollout": 20})),
            )
            .await;
        }

        let (status, body) = send(&app, get_req("/flags")).await;
        assert_eq!(status, StatusCode::OK);
        let flags = body.as_array().unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0]["name"], "one");
        assert_eq!(flags[0]["enabled"], true);
        assert_eq!(flags[1]["name"], "two");
        assert_eq!(flags[1]["rollout"], 20);
        assert!(flags[1]["updated_at"].is_string());
        assert!(flags[1].get("active").is_none());
    }

    #[tokio::test]
    async fn test_readyz_reports_counts() {
        let app = test_router();
        send(&app, post_flag(serde_json::json!({"name": "a", "enabled": true}))).await;
        send(&app, get_req("/flags/a")).await;

        let (status, body) = send(&app, get_req("/readyz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
        assert_eq!(body["storage"], "memory");
        assert_eq!(body["flags_stored"], 1);
        assert_eq!(body["cache"]["entries"], 1);
    }

    async fn scrape(app: &Router) -> String {
        let response = app.clone().oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // The registry is process-wide, so every /metrics assertion lives in
    // this one test.
    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = test_router();
        send(&app, get_req("/health")).await;
        let text = scrape(&app).await;
        assert!(text.contains("toggled_http_requests_total"));
        assert!(text.contains("toggled_cache_invalidations 0"));

        // unmatched routes share one label
        for uri in ["/no/such/path", "/flags/x/y/z", "/wp-admin"] {
            let (status, _) = send(&app, get_req(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let text = scrape(&app).await;
        assert!(text.contains(r#"path="unmatched""#));
        assert!(!text.contains("/no/such/path"));
        assert!(!text.contains("/wp-admin"));

        // invalidations come from the service's cache, including writes
        // that do not go through the HTTP handler
        for enabled in [true, false] {
            let (status, _) = send(
                &app,
                post_flag(serde_json::json!({"name": "dark-mode", "enabled": enabled})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let text = scrape(&app).await;
        assert!(text.contains("toggled_cache_invalidations 2"));

        let service = FlagService::new(Arc::new(MemoryStore::new()));
        let state = Arc::new(AppState::new(service, StorageBackend::Memory));
        state
            .service
            .create_or_update_flag(toggled_lib::FlagInput {
                name: "direct".to_string(),
                enabled: true,
                rollout: 100,
                environment: "prod".to_string(),
            })
            .await
            .unwrap();
        let text = scrape(&router(state)).await;
        assert!(text.contains("toggled_cache_invalidations 1"));
    }
}
