use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};

use super::{ApiError, AppState};

/// Header carrying the authenticated vendor, set by the upstream auth layer.
pub const VENDOR_ID_HEADER: &str = "x-vendor-id";

/// The vendor a request acts for.
#[derive(Debug, Clone)]
pub struct VendorIdentity(pub String);

impl<S> FromRequestParts<S> for VendorIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let vendor_id = parts
            .headers
            .get(VENDOR_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("missing X-Vendor-Id header".into()))?;
        Ok(VendorIdentity(vendor_id.to_string()))
    }
}

/// Admin routes require `Authorization: Bearer <token>` when a token is
/// configured.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let mut parts = header.splitn(2, ' ');
    let (Some(scheme), Some(token)) = (parts.next(), parts.next()) else {
        return Err(ApiError::Unauthorized("malformed authorization header".into()));
    };
    if !scheme.eq_ignore_ascii_case("Bearer") || token.trim() != expected {
        return Err(ApiError::Unauthorized("invalid admin token".into()));
    }

    Ok(next.run(request).await)
}
