use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::api::v1::extractors::RequestContext;
use crate::error::AppError;
use crate::state::AppState;

/// Anonymous -> 401. Authenticated without every required scope -> 403.
pub async fn scope_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<RequestContext>()
        .and_then(|ctx| ctx.principal.clone())
        .ok_or(AppError::Unauthorized)?;

    let missing = state.auth.missing_scopes(&principal);
    if !missing.is_empty() {
        tracing::warn!(
            subject = principal.subject(),
            missing = ?missing,
            "required scope not granted"
        );
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}
