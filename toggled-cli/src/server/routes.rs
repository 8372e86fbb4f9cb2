use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use toggled_lib::{CachedDecision, FlagError, FlagInput, FlagRecord, DEFAULT_ENVIRONMENT};

use super::error::ApiError;
use super::metrics::metrics;
use super::state::AppState;

// ── Health ───────────────────────────────────────────────────

pub async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

// ── GET /readyz ──────────────────────────────────────────────

/// Ready once the store answers a listing.
pub async fn handle_readyz(State(state): State<Arc<AppState>>) -> Response {
    let cache = state.service.cache_stats().await;
    match state.service.list_flags().await {
        Ok(flags) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ready": true,
                "storage": state.storage.as_str(),
                "flags_stored": flags.len(),
                "cache": cache,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "ready": false,
                    "storage": state.storage.as_str(),
                    "reason": "store unavailable",
                })),
            )
                .into_response()
        }
    }
}

// ── POST /flags ──────────────────────────────────────────────

pub async fn handle_upsert_flag(
    State(state): State<Arc<AppState>>,
    Json(input): Json<FlagInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let start = Instant::now();
    let m = metrics();

    match state.service.create_or_update_flag(input).await {
        Ok(record) => {
            m.writes_total.with_label_values(&["ok"]).inc();
            m.write_duration.observe(start.elapsed().as_secs_f64());
            Ok(Json(serde_json::json!({
                "status": "ok",
                "flag": record.name,
            })))
        }
        Err(e) => {
            let status = match e {
                FlagError::Validation { .. } => "invalid",
                _ => "error",
            };
            m.writes_total.with_label_values(&[status]).inc();
            Err(e.into())
        }
    }
}

// ── GET /flags/{name}?environment= ───────────────────────────

#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    pub environment: Option<String>,
}

pub async fn handle_get_flag(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<DecisionQuery>,
) -> Result<Json<CachedDecision>, ApiError> {
    let environment = query.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
    let m = metrics();

    match state.service.get_flag_traced(&name, Some(environment)).await {
        Ok((decision, outcome)) => {
            m.eval_total
                .with_label_values(&[environment, outcome.as_str()])
                .inc();
            Ok(Json(decision))
        }
        Err(e) => {
            if matches!(e, FlagError::NotFound { .. }) {
                m.eval_not_found.with_label_values(&[environment]).inc();
            }
            Err(e.into())
        }
    }
}

// ── GET /flags ───────────────────────────────────────────────

pub async fn handle_list_flags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FlagRecord>>, ApiError> {
    Ok(Json(state.service.list_flags().await?))
}
