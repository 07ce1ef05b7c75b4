/*
 * Responsibility
 * - GET /me: the authenticated principal as seen after claims transformation
 * - GET /token: whether the raw access token was preserved for this request
 */
use axum::Json;

use crate::api::v1::dto::me::{MeResponse, TokenStatusResponse};
use crate::api::v1::extractors::{AuthenticatedPrincipal, PreservedAccessToken};

pub async fn me(AuthenticatedPrincipal(principal): AuthenticatedPrincipal) -> Json<MeResponse> {
    Json(MeResponse::from(principal.as_ref()))
}

pub async fn token_status(
    _principal: AuthenticatedPrincipal,
    PreservedAccessToken(token): PreservedAccessToken,
) -> Json<TokenStatusResponse> {
    Json(TokenStatusResponse {
        preserved: token.is_some(),
    })
}
