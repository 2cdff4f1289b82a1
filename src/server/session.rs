//! Bearer token extraction, the gate in front of every mutating route.

use super::state::ServerState;
use crate::user::TokenService;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::convert::Infallible;
use tracing::debug;

use super::error::ErrorResponse;

/// An authenticated caller. Handlers that take a `Session` are only reached
/// with a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// The raw token of the request, not yet verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExtractionError {
    NoToken,
    MalformedToken,
    InvalidToken,
}

impl SessionExtractionError {
    pub fn message(&self) -> &'static str {
        match self {
            SessionExtractionError::NoToken => "No token provided",
            SessionExtractionError::MalformedToken => "Malformed token",
            SessionExtractionError::InvalidToken => "Invalid or expired token",
        }
    }
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message().to_string(),
            }),
        )
            .into_response()
    }
}

/// Reads `Authorization: <scheme> <token>`. The scheme must be Bearer.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<BearerToken, SessionExtractionError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(SessionExtractionError::NoToken)?;
    let value = value
        .to_str()
        .map_err(|_| SessionExtractionError::MalformedToken)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(SessionExtractionError::MalformedToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(SessionExtractionError::MalformedToken);
    }
    Ok(BearerToken(token.to_string()))
}

pub fn authorize(headers: &HeaderMap, tokens: &TokenService) -> Result<Session, SessionExtractionError> {
    let BearerToken(token) = extract_bearer_token(headers)?;
    match tokens.verify(&token) {
        Ok(verified) => Ok(Session {
            username: verified.subject,
            issued_at: verified.issued_at,
            expires_at: verified.expires_at,
        }),
        Err(err) => {
            debug!("Token rejected: {}", err);
            Err(SessionExtractionError::InvalidToken)
        }
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        authorize(&parts.headers, &ctx.tokens)
    }
}

impl OptionalFromRequestParts<ServerState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(authorize(&parts.headers, &ctx.tokens).ok())
    }
}

impl FromRequestParts<ServerState> for BearerToken {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        _ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_bearer_token(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{Account, ManualClock, DEFAULT_TOKEN_TTL};
    use axum::http::HeaderValue;
    use std::sync::Arc;

    const NOW: u64 = 1_700_000_000;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let tokens = TokenService::with_clock(b"secret", DEFAULT_TOKEN_TTL, clock.clone());
        (tokens, clock)
    }

    fn admin() -> Account {
        Account {
            username: "admin".to_string(),
            secret_hash: String::new(),
        }
    }

    #[test]
    fn missing_header_is_no_token() {
        let (tokens, _) = service();
        assert_eq!(
            authorize(&HeaderMap::new(), &tokens),
            Err(SessionExtractionError::NoToken)
        );
    }

    #[test]
    fn header_without_token_is_malformed() {
        let (tokens, _) = service();
        for value in ["Bearer", "Bearer ", "abc", "Basic dXNlcjpwdw=="] {
            assert_eq!(
                authorize(&headers_with(value), &tokens),
                Err(SessionExtractionError::MalformedToken),
                "{}",
                value
            );
        }
    }

    #[test]
    fn bad_token_is_invalid() {
        let (tokens, _) = service();
        assert_eq!(
            authorize(&headers_with("Bearer not.a.jwt"), &tokens),
            Err(SessionExtractionError::InvalidToken)
        );
    }

    #[test]
    fn valid_token_yields_session() {
        let (tokens, _) = service();
        let token = tokens.issue(&admin()).unwrap();
        let session = authorize(&headers_with(&format!("Bearer {}", token.value)), &tokens).unwrap();
        assert_eq!(session.username, "admin");
        assert_eq!(session.expires_at, token.expires_at);

        // Scheme is case insensitive.
        let session = authorize(&headers_with(&format!("bearer {}", token.value)), &tokens).unwrap();
        assert_eq!(session.username, "admin");
    }

    #[test]
    fn expired_token_is_invalid() {
        let (tokens, clock) = service();
        let token = tokens.issue(&admin()).unwrap();
        clock.set(token.expires_at + 1);
        assert_eq!(
            authorize(&headers_with(&format!("Bearer {}", token.value)), &tokens),
            Err(SessionExtractionError::InvalidToken)
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(SessionExtractionError::NoToken.message(), "No token provided");
        assert_eq!(SessionExtractionError::MalformedToken.message(), "Malformed token");
        assert_eq!(
            SessionExtractionError::InvalidToken.message(),
            "Invalid or expired token"
        );
    }
}
