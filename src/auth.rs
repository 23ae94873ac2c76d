//! Shared-secret gate for the trigger endpoint.

use axum::http::HeaderMap;

/// Check the shared secret against the `Authorization: Bearer` header or,
/// when no bearer header is present, a `token` query parameter. An empty
/// configured secret disables auth entirely.
pub fn is_authorized(expected: &str, headers: &HeaderMap, token_param: Option<&str>) -> bool {
    if expected.is_empty() {
        return true;
    }

    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if let Some(token) = header.strip_prefix("Bearer ") {
        return constant_time_eq(token.trim().as_bytes(), expected.as_bytes());
    }

    token_param
        .map(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
        .unwrap_or(false)
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
