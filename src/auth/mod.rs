// Authentication module - bearer secret for write requests

use http::header::AUTHORIZATION;
use http::HeaderMap;
use thiserror::Error;

use crate::security::constant_time_eq;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Malformed Authorization header")]
    Malformed,
    #[error("Invalid bearer token")]
    InvalidToken,
    #[error("Write access is disabled")]
    Disabled,
}

/// Token from `Authorization: Bearer <token>`
///
/// The scheme must be exactly `Bearer` followed by one space and a
/// non-empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::Malformed),
    }
}

/// Check a write request against the configured secret
///
/// An empty secret disables writes altogether.
pub fn authorize(headers: &HeaderMap, secret: &str) -> Result<(), AuthError> {
    if secret.is_empty() {
        return Err(AuthError::Disabled);
    }

    let token = extract_bearer_token(headers)?;
    if constant_time_eq(token, secret) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}
