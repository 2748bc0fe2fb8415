use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use signal_engine::strategy::ParseError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Strategy rejected: {0}")]
    StrategyRejected(#[from] ParseError),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Parse failures anywhere in the chain are the caller's fault, the rest is upstream
    pub fn from_evaluation(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ParseError>() {
            Some(parse) => ApiError::StrategyRejected(parse.clone()),
            None => ApiError::Upstream(format!("{:#}", err)),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::StrategyRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("❌ {}", self);
        }
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_parse_error_maps_to_unprocessable() {
        let result: Result<(), ParseError> = Err(ParseError::NoEntryConditions);
        let err = result.context("Strategy script was rejected").unwrap_err();

        let api = ApiError::from_evaluation(err);
        assert!(matches!(api, ApiError::StrategyRejected(_)));
        assert_eq!(api.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_other_errors_map_to_bad_gateway() {
        let api = ApiError::from_evaluation(anyhow::anyhow!("klines request timed out"));
        assert_eq!(api.status(), StatusCode::BAD_GATEWAY);
        assert!(api.to_string().contains("timed out"));
    }
}
