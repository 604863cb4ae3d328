//! Error taxonomy for every route and the terminal normalizer that turns
//! unhandled failures into the uniform JSON error body.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::state::AppState;
use crate::storage::{EntityKind, StoreError};
use crate::validation::Issue;

/// Detail shown instead of the failure chain in production.
pub const REDACTED_DETAIL: &str = "🥞";

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request ({} issues)", .0.len())]
    Validation(Vec<Issue>),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{error}")]
    Unhandled {
        status: StatusCode,
        error: anyhow::Error,
    },
}

impl ApiError {
    pub fn not_found(kind: EntityKind) -> Self {
        ApiError::NotFound(kind.not_found_message())
    }

    pub fn unhandled(error: impl Into<anyhow::Error>) -> Self {
        ApiError::Unhandled {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
        }
    }

    /// Keeps an explicitly chosen status; the default success code falls back to 500.
    pub fn with_status(self, status: StatusCode) -> Self {
        match self {
            ApiError::Unhandled { error, .. } => ApiError::Unhandled {
                status: unhandled_status(status),
                error,
            },
            other => other,
        }
    }
}

fn unhandled_status(set: StatusCode) -> StatusCode {
    if set == StatusCode::OK {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        set
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(kind) => ApiError::not_found(kind),
            StoreError::MissingOwner(_) => ApiError::not_found(EntityKind::User),
            // Email is the only unique key a client controls.
            StoreError::Conflict(constraint) if constraint.contains("email") => {
                warn!(%constraint, "unique constraint violated");
                ApiError::Conflict("Email already exists")
            }
            StoreError::Conflict(constraint) => {
                ApiError::unhandled(anyhow::anyhow!("unique constraint {constraint} violated"))
                    .with_status(StatusCode::CONFLICT)
            }
            StoreError::Backend(e) => ApiError::unhandled(e),
        }
    }
}

/// Unhandled failure parked on a response until [`normalize_errors`] renders it.
#[derive(Debug, Clone)]
pub struct UnhandledFailure {
    pub message: String,
    pub detail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    pub stack: serde_json::Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Invalid request", "issues": issues })),
            )
                .into_response(),
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "message": message }))).into_response()
            }
            ApiError::Unhandled { status, error } => {
                let message = error.to_string();
                let failure = UnhandledFailure {
                    message: if message.is_empty() {
                        "Unknown Error".into()
                    } else {
                        message
                    },
                    detail: format!("{error:?}"),
                };
                let mut res = unhandled_status(status).into_response();
                res.extensions_mut().insert(failure);
                res
            }
        }
    }
}

/// Outermost middleware: renders any parked [`UnhandledFailure`], verbose or
/// opaque depending on the operating mode. Other responses pass untouched.
pub async fn normalize_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let Some(failure) = res.extensions_mut().remove::<UnhandledFailure>() else {
        return res;
    };

    let status = unhandled_status(res.status());
    error!(%status, error = %failure.message, detail = %failure.detail, "unhandled failure");

    let stack = if state.config.mode.is_production() {
        json!(REDACTED_DETAIL)
    } else {
        json!(failure.detail)
    };
    let body = ErrorBody {
        error_message: failure.message,
        stack,
    };
    (status, Json(body)).into_response()
}
