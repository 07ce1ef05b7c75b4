//! Bearer-token authentication pipeline.
//!
//! Stages, outermost first:
//! 1. `access`: extract + validate the token, apply the claims transformation,
//!    attach `RequestContext` (anonymous on any failure)
//! 2. `scope`: reject requests lacking a required scope (only when scopes are configured)
//! 3. `preserve`: keep the raw token on the context (only when enabled)
//!
//! Which stages run is decided here, once, from `AuthService`.
use axum::Router;
use axum::middleware;

use crate::state::AppState;

pub mod access;
pub mod preserve;
pub mod scope;

/// Apply the auth pipeline to every route of `router`.
///
/// ```ignore
/// let protected = Router::new().route("/me", get(me));
/// let protected = middleware::auth::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    let mut router = router;

    // route_layer: the last layer added runs first.
    if state.auth.preserve_access_token() {
        router = router.route_layer(middleware::from_fn(preserve::preserve_middleware));
    }
    if !state.auth.required_scopes().is_empty() {
        router = router.route_layer(middleware::from_fn_with_state(
            state.clone(),
            scope::scope_middleware,
        ));
    }
    router.route_layer(middleware::from_fn_with_state(state, access::access_middleware))
}
