/*
 * Responsibility
 * - URL layout of v1
 * - /health is public; everything else sits behind the auth pipeline (route_layer)
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{
    health::health,
    me::{me, token_status},
};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let protected = Router::new()
        .route("/me", get(me))
        .route("/token", get(token_status));
    let protected = middleware::auth::apply(protected, state);

    public.merge(protected)
}
