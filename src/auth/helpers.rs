use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;

use super::middleware::AuthError;
use super::{TokenGenerator, parse_token};
use crate::store::Store;
use crate::types::Token;

/// Extracts a token string from a Basic auth header.
/// Expects format: Basic base64(x-token:actual_token)
pub fn extract_basic_auth_token(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;

    if username != "x-token" {
        return None;
    }

    Some(password.to_string())
}

/// Extracts token from Authorization header (Bearer or Basic).
/// `Ok(None)` means no header was sent.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Result<Option<String>, AuthError> {
    match auth_header {
        Some(header) => {
            if let Some(token) = header.strip_prefix("Bearer ") {
                Ok(Some(token.trim().to_string()))
            } else if header.starts_with("Basic ") {
                extract_basic_auth_token(header)
                    .ok_or(AuthError::InvalidToken)
                    .map(Some)
            } else {
                Err(AuthError::InvalidScheme)
            }
        }
        None => Ok(None),
    }
}

/// Checks a raw token against its stored hash and expiry.
pub(crate) fn validate_token(store: &dyn Store, raw_token: &str) -> Result<Token, AuthError> {
    let (lookup, _secret) = parse_token(raw_token).map_err(|_| AuthError::InvalidToken)?;

    let token = store
        .get_token_by_lookup(&lookup)
        .map_err(|e| {
            tracing::error!("Token lookup failed: {e}");
            AuthError::InternalError
        })?
        .ok_or(AuthError::InvalidToken)?;

    let verified = TokenGenerator::new()
        .and_then(|generator| generator.verify(raw_token, &token.token_hash))
        .map_err(|e| {
            tracing::error!("Token verification failed: {e}");
            AuthError::InternalError
        })?;
    if !verified {
        return Err(AuthError::InvalidToken);
    }

    if token.expires_at.is_some_and(|expires_at| expires_at < Utc::now()) {
        return Err(AuthError::TokenExpired);
    }

    if let Err(e) = store.update_token_last_used(&token.id) {
        tracing::warn!("Failed to update token last_used_at: {e}");
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let token = extract_token_from_header(Some("Bearer shelf_abc")).unwrap();
        assert_eq!(token.as_deref(), Some("shelf_abc"));
    }

    #[test]
    fn test_basic_header() {
        let encoded = STANDARD.encode("x-token:shelf_abc");
        let token = extract_token_from_header(Some(&format!("Basic {encoded}"))).unwrap();
        assert_eq!(token.as_deref(), Some("shelf_abc"));

        let wrong_user = STANDARD.encode("alice:shelf_abc");
        assert!(extract_basic_auth_token(&format!("Basic {wrong_user}")).is_none());
    }

    #[test]
    fn test_unknown_scheme_and_missing_header() {
        assert!(matches!(
            extract_token_from_header(Some("Digest abc")),
            Err(AuthError::InvalidScheme)
        ));
        assert!(extract_token_from_header(None).unwrap().is_none());
    }
}
