/*
 * Responsibility
 * - Load settings from the environment (PORT, APP_ENV, AUTH_*)
 * - Validate them for the selected validation mode (missing -> startup fails)
 */
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::services::auth::options::{
    CacheOptions, ClientCredentials, EndpointOptions, LocalOptions, SigningAlgorithm,
    ValidationMode, ValidationOptions, default_fallback_set, validation_endpoint_from_authority,
};
use crate::services::auth::principal::{ClaimTypeMapping, ISSUER_NAME_CLAIM, ISSUER_ROLE_CLAIM};
use crate::services::auth::result::ValidationFailure;

/// The application's own scope, always required unless `AUTH_SCOPE` is set empty.
pub const DEFAULT_APP_SCOPE: &str = "idmgr";

// Upper bounds for duration settings; anything larger is a typo, not a policy.
const MAX_LEEWAY_SECONDS: u64 = 60 * 60;
const MAX_VALIDATION_TIMEOUT_MS: u64 = 2 * 60 * 1000;
const MAX_RETRY_BACKOFF_MS: u64 = 60 * 1000;
const MAX_CACHE_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_value(value: Option<&str>) -> Self {
        match value.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("invalid key material in {key}: {reason}")]
    KeyMaterial { key: &'static str, reason: String },
    #[error("cannot build validation endpoint client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub validation: ValidationOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(vars, "PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::from_value(value(vars, "APP_ENV"));

        Ok(Self {
            addr,
            app_env,
            validation: validation_options(vars)?,
        })
    }
}

fn validation_options(vars: &HashMap<String, String>) -> Result<ValidationOptions, ConfigError> {
    let mode: ValidationMode = value(vars, "AUTH_VALIDATION_MODE")
        .ok_or(ConfigError::Missing("AUTH_VALIDATION_MODE"))?
        .parse()
        .map_err(|_| ConfigError::Invalid("AUTH_VALIDATION_MODE"))?;

    let local = if mode.uses_local() {
        Some(local_options(vars)?)
    } else {
        None
    };

    let endpoint = if mode.uses_endpoint() {
        Some(endpoint_options(vars)?)
    } else {
        None
    };

    let claim_mapping = ClaimTypeMapping::new(
        value(vars, "AUTH_NAME_CLAIM_TYPE").unwrap_or(ISSUER_NAME_CLAIM),
        value(vars, "AUTH_ROLE_CLAIM_TYPE").unwrap_or(ISSUER_ROLE_CLAIM),
    );

    let fallback_on = match value(vars, "AUTH_FALLBACK_ON") {
        Some(raw) => parse_fallback_set(raw)?,
        None => default_fallback_set(),
    };

    Ok(ValidationOptions {
        mode,
        local,
        endpoint,
        cache: cache_options(vars)?,
        required_scopes: required_scopes(vars),
        claim_mapping,
        preserve_access_token: parse_bool_or(vars, "AUTH_PRESERVE_ACCESS_TOKEN", false)?,
        token_query_parameter: value(vars, "AUTH_TOKEN_QUERY_PARAMETER").map(str::to_string),
        fallback_on,
    })
}

fn local_options(vars: &HashMap<String, String>) -> Result<LocalOptions, ConfigError> {
    let issuer = value(vars, "AUTH_ISSUER").ok_or(ConfigError::Missing("AUTH_ISSUER"))?;

    let signing_key_pem = value(vars, "AUTH_SIGNING_KEY_PEM")
        .ok_or(ConfigError::Missing("AUTH_SIGNING_KEY_PEM"))?
        .replace("\\n", "\n");

    let algorithm = match value(vars, "AUTH_SIGNING_ALG") {
        Some(raw) => SigningAlgorithm::from_str(raw)
            .map_err(|_| ConfigError::Invalid("AUTH_SIGNING_ALG"))?,
        None => SigningAlgorithm::EdDsa,
    };

    Ok(LocalOptions {
        issuer: issuer.to_string(),
        signing_key_pem,
        algorithm,
        leeway_seconds: parse_bounded_or(vars, "AUTH_LEEWAY_SECONDS", 0, MAX_LEEWAY_SECONDS)?,
    })
}

fn endpoint_options(vars: &HashMap<String, String>) -> Result<EndpointOptions, ConfigError> {
    let url = match (
        value(vars, "AUTH_VALIDATION_ENDPOINT"),
        value(vars, "AUTH_AUTHORITY"),
    ) {
        (Some(endpoint), _) => {
            Url::parse(endpoint).map_err(|_| ConfigError::Invalid("AUTH_VALIDATION_ENDPOINT"))?
        }
        (None, Some(authority)) => Url::parse(authority)
            .ok()
            .and_then(|a| validation_endpoint_from_authority(&a).ok())
            .ok_or(ConfigError::Invalid("AUTH_AUTHORITY"))?,
        (None, None) => return Err(ConfigError::Missing("AUTH_VALIDATION_ENDPOINT")),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid("AUTH_VALIDATION_ENDPOINT"));
    }

    let credentials = match (value(vars, "AUTH_CLIENT_ID"), value(vars, "AUTH_CLIENT_SECRET")) {
        (Some(id), Some(secret)) => Some(ClientCredentials {
            client_id: id.to_string(),
            client_secret: secret.to_string(),
        }),
        (Some(_), None) => return Err(ConfigError::Missing("AUTH_CLIENT_SECRET")),
        (None, Some(_)) => return Err(ConfigError::Missing("AUTH_CLIENT_ID")),
        (None, None) => None,
    };

    let timeout_ms = parse_bounded_or(
        vars,
        "AUTH_VALIDATION_TIMEOUT_MS",
        5_000,
        MAX_VALIDATION_TIMEOUT_MS,
    )?;
    if timeout_ms == 0 {
        return Err(ConfigError::Invalid("AUTH_VALIDATION_TIMEOUT_MS"));
    }

    Ok(EndpointOptions {
        url,
        credentials,
        timeout: Duration::from_millis(timeout_ms),
        retry_backoff: Duration::from_millis(parse_bounded_or(
            vars,
            "AUTH_VALIDATION_RETRY_BACKOFF_MS",
            200,
            MAX_RETRY_BACKOFF_MS,
        )?),
    })
}

fn cache_options(vars: &HashMap<String, String>) -> Result<CacheOptions, ConfigError> {
    let defaults = CacheOptions::default();

    let ttl_secs = parse_bounded_or(
        vars,
        "AUTH_CACHE_TTL_SECONDS",
        defaults.ttl.as_secs(),
        MAX_CACHE_SECONDS,
    )?;
    // Rejections are remembered as long as successes unless configured otherwise.
    let failure_ttl_secs = parse_bounded_or(
        vars,
        "AUTH_CACHE_FAILURE_TTL_SECONDS",
        ttl_secs,
        MAX_CACHE_SECONDS,
    )?;
    let sweep_secs = parse_bounded_or(
        vars,
        "AUTH_CACHE_SWEEP_SECONDS",
        defaults.sweep_interval.as_secs(),
        MAX_CACHE_SECONDS,
    )?;

    Ok(CacheOptions {
        enabled: parse_bool_or(vars, "AUTH_CACHE_ENABLED", defaults.enabled)?,
        ttl: Duration::from_secs(ttl_secs),
        failure_ttl: Duration::from_secs(failure_ttl_secs),
        sweep_interval: Duration::from_secs(sweep_secs),
    })
}

fn required_scopes(vars: &HashMap<String, String>) -> BTreeSet<String> {
    let mut scopes: BTreeSet<String> = value(vars, "AUTH_REQUIRED_SCOPES")
        .map(split_list)
        .unwrap_or_default();

    // Present-but-empty AUTH_SCOPE turns the application scope off.
    let app_scope = match vars.get("AUTH_SCOPE") {
        Some(raw) => Some(raw.trim()).filter(|s| !s.is_empty()),
        None => Some(DEFAULT_APP_SCOPE),
    };
    if let Some(scope) = app_scope {
        scopes.insert(scope.to_string());
    }

    scopes
}

fn parse_fallback_set(raw: &str) -> Result<HashSet<ValidationFailure>, ConfigError> {
    split_list(raw)
        .into_iter()
        .map(|name| {
            let reason: ValidationFailure = name
                .parse()
                .map_err(|_| ConfigError::Invalid("AUTH_FALLBACK_ON"))?;
            // Only local failure reasons can trigger a fallback.
            match reason {
                ValidationFailure::EndpointRejected | ValidationFailure::EndpointUnreachable => {
                    Err(ConfigError::Invalid("AUTH_FALLBACK_ON"))
                }
                local => Ok(local),
            }
        })
        .collect()
}

fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Blank values count as unset.
fn value<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value(vars, key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bounded_or(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let parsed = parse_or(vars, key, default)?;
    if parsed > max {
        return Err(ConfigError::Invalid(key));
    }
    Ok(parsed)
}

fn parse_bool_or(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match value(vars, key).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}
