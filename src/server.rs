//! HTTP server for focus ranking

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::{FocusEngine, RankError, RankRequest, RankResponse};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub advisory_enabled: bool,
}

async fn rank_handler(
    State(engine): State<Arc<FocusEngine>>,
    Json(req): Json<RankRequest>,
) -> Result<Json<RankResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        "Received rank request: {} tasks, mode={:?}, limit={:?}",
        req.tasks.len(),
        req.mode,
        req.limit
    );

    match engine.rank_with_advisory(req).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("Ranking failed: {}", e);
            let status = match &e {
                RankError::Strict(_) => StatusCode::BAD_GATEWAY,
                RankError::Data { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: "Ranking failed".to_string(),
                    details: Some(e.to_string()),
                }),
            ))
        }
    }
}

async fn health_handler(State(engine): State<Arc<FocusEngine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "focusrank".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        advisory_enabled: engine.advisory_enabled(),
    })
}

pub fn create_router(engine: Arc<FocusEngine>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rank", post(rank_handler))
        .with_state(engine)
}

/// Run the HTTP server
pub async fn run_server(engine: Arc<FocusEngine>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!("Starting focusrank server on {}", addr);

    let app = create_router(engine);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
