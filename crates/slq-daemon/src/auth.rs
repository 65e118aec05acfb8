//! Bearer-token gates for the worker trigger and the admin surface.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::api_types::RefusedResponse;

fn bearer_from(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Check `Authorization: Bearer <token>` against the expected credential.
///
/// `None` expected means the surface is not configured on this deployment:
/// refuse with 503 rather than letting an unset env var open the door.
pub fn require_bearer(
    headers: &HeaderMap,
    expected: Option<&str>,
    gate: &str,
) -> Result<(), Response> {
    let Some(expected) = expected else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RefusedResponse {
                error: format!("GATE_REFUSED: no credential configured for {gate}"),
                gate: gate.to_string(),
            }),
        )
            .into_response());
    };

    match bearer_from(headers) {
        Some(presented) if presented == expected => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(RefusedResponse {
                error: format!("GATE_REFUSED: missing or invalid bearer token for {gate}"),
                gate: gate.to_string(),
            }),
        )
            .into_response()),
    }
}
