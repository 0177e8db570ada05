use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::leads::repository::RepositoryError;
use crate::telemetry::TelemetryError;

/// Error taxonomy shared by every service in the engine.
///
/// `NotFound` deliberately covers both "entity absent" and "entity owned by a
/// different agency" so existence never leaks across tenants.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => CoreError::NotFound,
            RepositoryError::Conflict => CoreError::Conflict("duplicate record".to_string()),
            other => CoreError::Repository(other),
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match self {
            CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::NotFound => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Process-level failures raised while bringing the service up.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
}
