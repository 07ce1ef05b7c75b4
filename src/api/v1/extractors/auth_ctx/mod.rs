/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Hand the request's authentication context (RequestContext) to handlers
 * - axum-specific code stays in core; the types live in types
 *
 * Public API:
 * - RequestContext, AccessToken
 * - AuthenticatedPrincipal, PreservedAccessToken
 */

mod core;
mod types;

pub use core::{AuthenticatedPrincipal, PreservedAccessToken};
pub use types::{AccessToken, RequestContext};
