use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::Principal;

use super::{AccessToken, RequestContext};

/// Extractor for the authenticated principal.
/// The auth middleware must have inserted a `RequestContext` into request extensions;
/// an anonymous context or a missing one is rejected with 401.
pub struct AuthenticatedPrincipal(pub Arc<Principal>);

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.principal.clone())
            .map(AuthenticatedPrincipal)
            .ok_or(AppError::Unauthorized)
    }
}

/// The preserved raw token, if preservation is enabled and the request is authenticated.
pub struct PreservedAccessToken(pub Option<AccessToken>);

impl<S> FromRequestParts<S> for PreservedAccessToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PreservedAccessToken(
            parts
                .extensions
                .get::<RequestContext>()
                .and_then(|ctx| ctx.access_token.clone()),
        ))
    }
}
