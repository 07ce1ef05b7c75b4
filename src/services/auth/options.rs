/*
 * Responsibility
 * - Validation settings fixed at startup (mode, key material, endpoint, cache, scopes)
 * - Issuer -> audience derivation
 *
 * Notes
 * - Parsing from the environment lives in `config`; this module only holds typed values.
 * - Mode-specific settings are `Option`s; the factory refuses to build a mode whose
 *   settings are absent.
 */
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::services::auth::principal::ClaimTypeMapping;
use crate::services::auth::result::ValidationFailure;

/// Path appended to the authority when no explicit validation endpoint is configured.
pub const VALIDATION_ENDPOINT_PATH: &str = "connect/accesstokenvalidation";

const AUDIENCE_SUFFIX: &str = "resources";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Local,
    Endpoint,
    Both,
}

impl FromStr for ValidationMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "endpoint" | "validation_endpoint" | "validationendpoint" => Ok(Self::Endpoint),
            "both" => Ok(Self::Both),
            _ => Err(()),
        }
    }
}

impl ValidationMode {
    pub fn uses_local(&self) -> bool {
        matches!(self, Self::Local | Self::Both)
    }

    pub fn uses_endpoint(&self) -> bool {
        matches!(self, Self::Endpoint | Self::Both)
    }
}

/// Signature algorithms accepted for locally validated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    EdDsa,
    Rs256,
    Es256,
}

impl FromStr for SigningAlgorithm {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EDDSA" | "ED25519" => Ok(Self::EdDsa),
            "RS256" => Ok(Self::Rs256),
            "ES256" => Ok(Self::Es256),
            _ => Err(()),
        }
    }
}

impl From<SigningAlgorithm> for Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        match alg {
            SigningAlgorithm::EdDsa => Algorithm::EdDSA,
            SigningAlgorithm::Rs256 => Algorithm::RS256,
            SigningAlgorithm::Es256 => Algorithm::ES256,
        }
    }
}

/// Settings for offline (signature-based) validation.
#[derive(Clone)]
pub struct LocalOptions {
    pub issuer: String,
    pub signing_key_pem: String,
    pub algorithm: SigningAlgorithm,
    pub leeway_seconds: u64,
}

impl fmt::Debug for LocalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalOptions")
            .field("issuer", &self.issuer)
            .field("algorithm", &self.algorithm)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish_non_exhaustive()
    }
}

impl LocalOptions {
    pub fn audience(&self) -> String {
        derive_audience(&self.issuer)
    }
}

#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the secret
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Settings for remote validation.
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    pub url: Url,
    pub credentials: Option<ClientCredentials>,
    pub timeout: Duration,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    pub enabled: bool,
    pub ttl: Duration,
    // Applied to rejections; defaults to `ttl`.
    pub failure_ttl: Duration,
    // Zero disables the periodic sweep (entries still expire on read).
    pub sweep_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
            failure_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub mode: ValidationMode,
    pub local: Option<LocalOptions>,
    pub endpoint: Option<EndpointOptions>,
    pub cache: CacheOptions,
    pub required_scopes: BTreeSet<String>,
    pub claim_mapping: ClaimTypeMapping,
    pub preserve_access_token: bool,
    pub token_query_parameter: Option<String>,
    // Local failures that fall through to the endpoint in `Both` mode.
    pub fallback_on: HashSet<ValidationFailure>,
}

/// Default `Both`-mode fallback set: only tokens the local validator cannot parse.
pub fn default_fallback_set() -> HashSet<ValidationFailure> {
    HashSet::from([ValidationFailure::Malformed])
}

/// `audience = issuer + "resources"`, with the issuer normalized to exactly one
/// trailing `/` first.
pub fn derive_audience(issuer: &str) -> String {
    format!("{}/{}", issuer.trim_end_matches('/'), AUDIENCE_SUFFIX)
}

/// `authority/connect/accesstokenvalidation`.
pub fn validation_endpoint_from_authority(authority: &Url) -> Result<Url, url::ParseError> {
    let mut base = authority.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(VALIDATION_ENDPOINT_PATH)
}
