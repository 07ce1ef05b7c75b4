//! Access token validation -> RequestContext in request extensions.
//!
//! This stage never rejects. A missing or invalid token leaves the request
//! anonymous; rejecting is up to the scope stage or the handler's extractor.
//! The token itself is never logged, only a short digest prefix, and it only
//! travels further down the request when preservation is enabled.
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::preserve::ValidatedToken;
use crate::api::v1::extractors::{AccessToken, RequestContext};
use crate::services::auth::{Principal, ValidationResult};
use crate::services::cache::{cache_key, key_fingerprint};
use crate::state::AppState;

pub async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = match state.auth.extract_token(req.headers(), req.uri()) {
        None => RequestContext::anonymous(),
        Some(token) => match authenticate(&state, &token).await {
            Some(principal) => {
                if state.auth.preserve_access_token() {
                    req.extensions_mut()
                        .insert(ValidatedToken(AccessToken::new(token)));
                }
                RequestContext::authenticated(principal)
            }
            None => RequestContext::anonymous(),
        },
    };

    // middleware -> extractor handoff
    req.extensions_mut().insert(ctx);

    next.run(req).await
}

async fn authenticate(state: &AppState, token: &str) -> Option<Arc<Principal>> {
    match state.auth.validate(token).await {
        ValidationResult::Success(principal) => {
            let principal = state.auth.transform(principal);
            tracing::debug!(subject = principal.subject(), "access token validated");
            Some(principal)
        }
        ValidationResult::Failure(reason) => {
            let digest = cache_key(token);
            tracing::warn!(
                reason = reason.as_str(),
                token_id = key_fingerprint(&digest),
                "access token validation failed"
            );
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::{BTreeSet, HashSet};
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Router, middleware};
    use tower::ServiceExt;

    use super::*;
    use crate::services::auth::ClaimTypeMapping;
    use crate::services::auth::build_auth_service;
    use crate::services::auth::options::{
        CacheOptions, LocalOptions, SigningAlgorithm, ValidationMode, ValidationOptions,
    };
    use crate::test_support::{ISSUER, SIGNING_PUBLIC_KEY_PEM, mint, valid_claims};

    fn state(preserve_access_token: bool) -> AppState {
        let options = ValidationOptions {
            mode: ValidationMode::Local,
            local: Some(LocalOptions {
                issuer: ISSUER.to_string(),
                signing_key_pem: SIGNING_PUBLIC_KEY_PEM.to_string(),
                algorithm: SigningAlgorithm::EdDsa,
                leeway_seconds: 0,
            }),
            endpoint: None,
            cache: CacheOptions {
                sweep_interval: Duration::ZERO,
                ..CacheOptions::default()
            },
            required_scopes: BTreeSet::new(),
            claim_mapping: ClaimTypeMapping::default(),
            preserve_access_token,
            token_query_parameter: None,
            fallback_on: HashSet::new(),
        };
        AppState::new(Arc::new(build_auth_service(&options).unwrap()))
    }

    // 200: authenticated and the raw token travels on; 204: authenticated, no token anywhere
    async fn inspect(req: Request<Body>) -> StatusCode {
        let Some(ctx) = req.extensions().get::<RequestContext>() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        if !ctx.is_authenticated() || ctx.access_token.is_some() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        if req.extensions().get::<ValidatedToken>().is_some() {
            StatusCode::OK
        } else {
            StatusCode::NO_CONTENT
        }
    }

    async fn status_for(preserve_access_token: bool) -> StatusCode {
        let state = state(preserve_access_token);
        let router: Router = Router::new()
            .route("/", get(inspect))
            .route_layer(middleware::from_fn_with_state(state, access_middleware));
        let request = Request::builder()
            .uri("/")
            .header("authorization", format!("Bearer {}", mint(&valid_claims())))
            .body(Body::empty())
            .unwrap();

        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn token_is_not_attached_when_preservation_is_off() {
        assert_eq!(status_for(false).await, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn token_is_handed_to_the_preserve_stage_when_enabled() {
        assert_eq!(status_for(true).await, StatusCode::OK);
    }
}
