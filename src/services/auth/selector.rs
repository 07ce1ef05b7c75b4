use std::collections::HashSet;

use crate::services::auth::endpoint::EndpointValidator;
use crate::services::auth::local::LocalValidator;
use crate::services::auth::options::ValidationMode;
use crate::services::auth::result::{ValidationFailure, ValidationResult};

/// Validation mode, fixed at startup, with the validators that mode needs.
///
/// - `Local`: signature validation only; every failure is terminal.
/// - `Endpoint`: remote validation only (cache consulted inside the endpoint validator).
/// - `Both`: local first; a local failure in `fallback_on` is retried at the
///   endpoint and the endpoint's answer is final. Other local failures are terminal.
#[derive(Debug)]
pub enum ValidationModeSelector {
    Local(LocalValidator),
    Endpoint(EndpointValidator),
    Both {
        local: LocalValidator,
        endpoint: EndpointValidator,
        fallback_on: HashSet<ValidationFailure>,
    },
}

impl ValidationModeSelector {
    pub fn mode(&self) -> ValidationMode {
        match self {
            Self::Local(_) => ValidationMode::Local,
            Self::Endpoint(_) => ValidationMode::Endpoint,
            Self::Both { .. } => ValidationMode::Both,
        }
    }

    pub async fn validate(&self, token: &str) -> ValidationResult {
        match self {
            Self::Local(local) => local.validate(token),
            Self::Endpoint(endpoint) => endpoint.validate(token).await,
            Self::Both {
                local,
                endpoint,
                fallback_on,
            } => {
                let reason = match local.verify(token) {
                    Ok(principal) => return ValidationResult::success(principal),
                    Err(reason) => reason,
                };

                if !fallback_on.contains(&reason) {
                    return reason.into();
                }

                tracing::debug!(
                    reason = reason.as_str(),
                    "local validation failed, falling back to validation endpoint"
                );
                endpoint.validate(token).await
            }
        }
    }
}
