use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::api::v1::extractors::{AccessToken, RequestContext};

/// Raw token handed over by the access stage. Only attached when preservation is enabled.
#[derive(Clone)]
pub(crate) struct ValidatedToken(pub(crate) AccessToken);

/// Moves the validated raw token onto the context for downstream handlers.
pub async fn preserve_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(ValidatedToken(token)) = req.extensions_mut().remove::<ValidatedToken>() {
        if let Some(ctx) = req.extensions_mut().get_mut::<RequestContext>() {
            ctx.access_token = Some(token);
        }
    }

    next.run(req).await
}
