use crate::error::ApiError;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

/// Caller identity as verified by the fronting gateway. Authentication
/// itself is an external collaborator; this layer only consumes the headers
/// the gateway injects after verifying the user's token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: String,
    pub operator: bool,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Shared-secret guard for internal endpoints (scheduler, task channel,
/// result uploads, admin). An unset secret locks the endpoint rather than
/// opening it.
pub fn require_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let expected = expected
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("endpoint secret not configured".into()))?;
    match bearer_token(headers) {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::Unauthenticated("invalid bearer token".into())),
    }
}

/// Identity of an authenticated player call.
pub fn identity(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let uid = headers
        .get("x-auth-uid")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("auth required".into()))?;
    let operator = headers
        .get("x-auth-claims")
        .and_then(|v| v.to_str().ok())
        .map(|claims| {
            claims
                .split(',')
                .map(str::trim)
                .any(|c| c == "operator" || c == "admin")
        })
        .unwrap_or(false);
    Ok(Identity {
        uid: uid.to_string(),
        operator,
    })
}

pub fn require_operator(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let id = identity(headers)?;
    if !id.operator {
        return Err(ApiError::PermissionDenied("operator permission required".into()));
    }
    Ok(id)
}
