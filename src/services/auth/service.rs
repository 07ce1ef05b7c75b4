use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, Uri};

use crate::services::auth::principal::Principal;
use crate::services::auth::result::ValidationResult;
use crate::services::auth::selector::ValidationModeSelector;
use crate::services::auth::token::TokenExtractor;

/// Application hook applied to every authenticated principal before scope enforcement.
pub type ClaimsTransformation = Arc<dyn Fn(Principal) -> Principal + Send + Sync>;

/// Everything the auth pipeline stages need, built once at startup.
pub struct AuthService {
    selector: ValidationModeSelector,
    extractor: TokenExtractor,
    required_scopes: BTreeSet<String>,
    preserve_access_token: bool,
    claims_transformation: Option<ClaimsTransformation>,
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("mode", &self.selector.mode())
            .field("required_scopes", &self.required_scopes)
            .field("preserve_access_token", &self.preserve_access_token)
            .field("claims_transformation", &self.claims_transformation.is_some())
            .finish()
    }
}

impl AuthService {
    pub fn new(
        selector: ValidationModeSelector,
        extractor: TokenExtractor,
        required_scopes: BTreeSet<String>,
        preserve_access_token: bool,
    ) -> Self {
        Self {
            selector,
            extractor,
            required_scopes,
            preserve_access_token,
            claims_transformation: None,
        }
    }

    pub fn with_claims_transformation(mut self, transformation: ClaimsTransformation) -> Self {
        self.claims_transformation = Some(transformation);
        self
    }

    pub fn selector(&self) -> &ValidationModeSelector {
        &self.selector
    }

    pub fn required_scopes(&self) -> &BTreeSet<String> {
        &self.required_scopes
    }

    pub fn preserve_access_token(&self) -> bool {
        self.preserve_access_token
    }

    pub fn extract_token(&self, headers: &HeaderMap, uri: &Uri) -> Option<String> {
        self.extractor.extract(headers, uri)
    }

    pub async fn validate(&self, token: &str) -> ValidationResult {
        self.selector.validate(token).await
    }

    /// Applies the claims transformation, if any.
    pub fn transform(&self, principal: Arc<Principal>) -> Arc<Principal> {
        match &self.claims_transformation {
            Some(transform) => Arc::new(transform(Arc::unwrap_or_clone(principal))),
            None => principal,
        }
    }

    /// Required scopes the principal was not granted. Exact, case-sensitive match.
    pub fn missing_scopes<'a>(&'a self, principal: &Principal) -> Vec<&'a str> {
        self.required_scopes
            .iter()
            .filter(|scope| !principal.has_scope(scope))
            .map(String::as_str)
            .collect()
    }
}
