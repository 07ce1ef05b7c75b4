/// Factory: build `AuthService` from `ValidationOptions`.
use std::sync::Arc;

use crate::config::ConfigError;
use crate::services::auth::endpoint::{EndpointCache, EndpointValidator};
use crate::services::auth::local::LocalValidator;
use crate::services::auth::options::{ValidationMode, ValidationOptions};
use crate::services::auth::selector::ValidationModeSelector;
use crate::services::auth::service::AuthService;
use crate::services::auth::token::TokenExtractor;
use crate::services::cache::{InMemoryValidationResultCache, ValidationResultCache};

pub fn build_auth_service(options: &ValidationOptions) -> Result<AuthService, ConfigError> {
    let store: Option<Arc<dyn ValidationResultCache>> =
        if options.mode.uses_endpoint() && options.cache.enabled {
            let cache = if options.cache.sweep_interval.is_zero() {
                InMemoryValidationResultCache::new()
            } else {
                InMemoryValidationResultCache::with_sweep_interval(options.cache.sweep_interval)
            };
            Some(Arc::new(cache))
        } else {
            None
        };

    build_auth_service_with_cache(options, store)
}

/// Same as [`build_auth_service`], with the cache store supplied by the caller.
///
/// `store` is ignored when the mode never calls the endpoint or caching is disabled.
pub fn build_auth_service_with_cache(
    options: &ValidationOptions,
    store: Option<Arc<dyn ValidationResultCache>>,
) -> Result<AuthService, ConfigError> {
    let selector = build_selector(options, store)?;

    tracing::info!(
        mode = ?selector.mode(),
        required_scopes = ?options.required_scopes,
        preserve_access_token = options.preserve_access_token,
        "access token validation configured"
    );

    Ok(AuthService::new(
        selector,
        TokenExtractor::new(options.token_query_parameter.clone()),
        options.required_scopes.clone(),
        options.preserve_access_token,
    ))
}

fn build_selector(
    options: &ValidationOptions,
    store: Option<Arc<dyn ValidationResultCache>>,
) -> Result<ValidationModeSelector, ConfigError> {
    let selector = match options.mode {
        ValidationMode::Local => ValidationModeSelector::Local(build_local(options)?),
        ValidationMode::Endpoint => ValidationModeSelector::Endpoint(build_endpoint(options, store)?),
        ValidationMode::Both => ValidationModeSelector::Both {
            local: build_local(options)?,
            endpoint: build_endpoint(options, store)?,
            fallback_on: options.fallback_on.clone(),
        },
    };
    Ok(selector)
}

fn build_local(options: &ValidationOptions) -> Result<LocalValidator, ConfigError> {
    let local = options
        .local
        .as_ref()
        .ok_or(ConfigError::Missing("AUTH_ISSUER"))?;

    LocalValidator::new(local, options.claim_mapping.clone()).map_err(|e| {
        ConfigError::KeyMaterial {
            key: "AUTH_SIGNING_KEY_PEM",
            reason: e.to_string(),
        }
    })
}

fn build_endpoint(
    options: &ValidationOptions,
    store: Option<Arc<dyn ValidationResultCache>>,
) -> Result<EndpointValidator, ConfigError> {
    let endpoint = options
        .endpoint
        .clone()
        .ok_or(ConfigError::Missing("AUTH_VALIDATION_ENDPOINT"))?;

    let cache = store
        .filter(|_| options.cache.enabled)
        .map(|store| EndpointCache {
            store,
            ttl: options.cache.ttl,
            failure_ttl: options.cache.failure_ttl,
        });

    EndpointValidator::new(endpoint, options.claim_mapping.clone(), cache)
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}
