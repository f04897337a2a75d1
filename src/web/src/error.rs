use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error surface of every endpoint: a machine-readable code plus a human
/// message, wrapped in the standard `{ok:false}` envelope.
#[derive(Debug)]
pub enum ApiError {
    InvalidArgument(String),
    Unauthenticated(String),
    PermissionDenied(String),
    NotFound(String),
    FailedPrecondition(String),
    ResourceExhausted(String),
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidArgument(_) => "invalid-argument",
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::PermissionDenied(_) => "permission-denied",
            ApiError::NotFound(_) => "not-found",
            ApiError::FailedPrecondition(_) => "failed-precondition",
            ApiError::ResourceExhausted(_) => "resource-exhausted",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::FailedPrecondition(_) => StatusCode::CONFLICT,
            ApiError::ResourceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::InvalidArgument(m)
            | ApiError::Unauthenticated(m)
            | ApiError::PermissionDenied(m)
            | ApiError::NotFound(m)
            | ApiError::FailedPrecondition(m)
            | ApiError::ResourceExhausted(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "ok": false,
            "error": self.code(),
            "message": self.message(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { collection, id } => {
                ApiError::FailedPrecondition(format!("{}/{} already exists", collection, id))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: ApiError = StoreError::AlreadyExists {
            collection: "ops_locks",
            id: "play-day:2025-03-01".into(),
        }
        .into();
        assert_eq!(err.code(), "failed-precondition");

        let err: ApiError = StoreError::RetriesExhausted(16).into();
        assert_eq!(err.code(), "internal");
    }
}
