//! Shared fixtures for integration tests: option builders on top of the
//! signing keys and token minter the unit tests use.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

#[path = "../../src/test_support.rs"]
mod keys;

pub use keys::*;

use std::collections::BTreeSet;
use std::time::Duration;

use access_token_validation::services::auth::ClaimTypeMapping;
use access_token_validation::services::auth::options::{
    CacheOptions, EndpointOptions, LocalOptions, SigningAlgorithm, ValidationMode,
    ValidationOptions, default_fallback_set,
};
use serde_json::{Value, json};

pub const VALIDATION_PATH: &str = "/connect/accesstokenvalidation";

/// An opaque reference token: not a JWT, so local validation calls it malformed.
pub const REFERENCE_TOKEN: &str = "3f1c9a7e5b2d4c6a8e0f1b3d5c7a9e2f";

/// What the validation endpoint returns for an accepted reference token.
pub fn endpoint_claims() -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "818727",
        "name": "Alice",
        "role": "IdentityManagerAdministrator",
        "scope": "openid idmgr",
        "exp": now() + 3600,
    })
}

pub fn local_options() -> LocalOptions {
    LocalOptions {
        issuer: ISSUER.to_string(),
        signing_key_pem: SIGNING_PUBLIC_KEY_PEM.to_string(),
        algorithm: SigningAlgorithm::EdDsa,
        leeway_seconds: 0,
    }
}

pub fn endpoint_options(server_uri: &str) -> EndpointOptions {
    EndpointOptions {
        url: format!("{server_uri}{VALIDATION_PATH}").parse().unwrap(),
        credentials: None,
        timeout: Duration::from_secs(2),
        retry_backoff: Duration::from_millis(10),
    }
}

/// Options for `mode`, with the endpoint pointing at `server_uri` when given.
pub fn validation_options(mode: ValidationMode, server_uri: Option<&str>) -> ValidationOptions {
    ValidationOptions {
        mode,
        local: mode.uses_local().then(local_options),
        endpoint: server_uri.map(endpoint_options),
        cache: CacheOptions {
            sweep_interval: Duration::ZERO,
            ..CacheOptions::default()
        },
        required_scopes: BTreeSet::from(["idmgr".to_string()]),
        claim_mapping: ClaimTypeMapping::default(),
        preserve_access_token: false,
        token_query_parameter: None,
        fallback_on: default_fallback_set(),
    }
}
