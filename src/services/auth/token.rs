//! Pulls the bearer token out of an inbound request.
use axum::http::{HeaderMap, Uri, header};

/// Token location policy.
///
/// - `Authorization: Bearer <token>` (scheme is case-insensitive)
/// - optionally a query parameter, consulted only when no Authorization header is sent
///
/// A non-Bearer scheme or an empty token yields `None` (anonymous request).
#[derive(Debug, Clone, Default)]
pub struct TokenExtractor {
    query_parameter: Option<String>,
}

impl TokenExtractor {
    pub fn new(query_parameter: Option<String>) -> Self {
        Self { query_parameter }
    }

    pub fn extract(&self, headers: &HeaderMap, uri: &Uri) -> Option<String> {
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            return value.to_str().ok().and_then(bearer_token).map(str::to_string);
        }

        let name = self.query_parameter.as_deref()?;
        let query = uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Returns the token of a `Bearer` credential, or `None` for other schemes.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, rest) = authorization
        .trim()
        .split_once(|c: char| c.is_ascii_whitespace())?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}
