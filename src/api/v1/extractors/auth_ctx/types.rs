/*
 * Responsibility
 * - The per-request authentication context seen by handlers
 * - middleware fills it into request extensions; handlers only read it
 *
 * Notes
 * - Validation logic lives in services/auth; this is the contract type only
 */
use std::fmt;
use std::sync::Arc;

use crate::services::auth::Principal;

/// A raw bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Authentication context attached to every request under the auth pipeline.
///
/// - `principal` is `None` for anonymous requests (no token, or a token that failed validation)
/// - `access_token` is set only when token preservation is enabled
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<Arc<Principal>>,
    pub access_token: Option<AccessToken>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(principal: Arc<Principal>) -> Self {
        Self {
            principal: Some(principal),
            access_token: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}
