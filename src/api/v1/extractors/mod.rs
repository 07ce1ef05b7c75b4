pub mod auth_ctx;

pub use auth_ctx::{AccessToken, AuthenticatedPrincipal, PreservedAccessToken, RequestContext};
