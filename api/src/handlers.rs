use crate::error::ApiError;
use crate::ApiState;
use axum::extract::{Path, State};
use axum::Json;
use bot::services::evaluation::{self, EvaluateRequest};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            data,
        })
    }
}

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/strategies/evaluate
pub async fn evaluate(
    State(state): State<ApiState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<ApiResponse<evaluation::EvaluationReport>>, ApiError> {
    info!(
        "📊 Evaluating script on {} {} ({})",
        request.symbol, request.timeframe, request.market_type
    );
    let report = evaluation::evaluate(
        state.market.as_ref(),
        &state.cache,
        state.candle_limit,
        &request,
    )
    .await
    .map_err(ApiError::from_evaluation)?;
    Ok(ApiResponse::success(report))
}

/// POST /api/bots/run
pub async fn run_once(
    State(state): State<ApiState>,
) -> Result<Json<ApiResponse<bot::services::scheduler::RunReport>>, ApiError> {
    info!("🔄 Run requested over HTTP");
    let report = state
        .scheduler
        .run_once()
        .await
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;
    Ok(ApiResponse::success(report))
}

/// POST /api/users/:user_id/close-all
pub async fn close_all(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<bot::services::execution::CloseResult>>>, ApiError> {
    info!("🧹 [User {}] Close-all requested", user_id);
    let results = state
        .executor
        .close_all(user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(ApiResponse::success(results))
}
