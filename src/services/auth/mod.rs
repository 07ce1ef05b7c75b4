pub mod endpoint;
pub mod factory;
pub mod local;
pub mod options;
pub mod principal;
pub mod result;
pub mod selector;
pub mod service;
pub mod token;

pub use factory::{build_auth_service, build_auth_service_with_cache};
pub use principal::{ClaimTypeMapping, Principal};
pub use result::{ValidationFailure, ValidationResult};
pub use service::{AuthService, ClaimsTransformation};
