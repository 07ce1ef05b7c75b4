//! Cache interface used by endpoint validation to avoid repeated remote calls.
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::services::auth::result::ValidationResult;

/// A validation-result cache keyed by token digest.
///
/// The cache is an optimization only: a miss, a flush or a backend that stores
/// nothing must never change a validation outcome.
///
/// Implementations must be safe to share across requests (`Arc<dyn ...>`) and
/// must never hand out an entry past its expiry.
#[async_trait]
pub trait ValidationResultCache: Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Returns the stored result, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Option<ValidationResult>;

    // Stores `result` for `ttl`. Last writer wins for the same key.
    // A zero TTL stores nothing.
    async fn put(&self, key: &str, result: ValidationResult, ttl: Duration);

    async fn remove(&self, key: &str);

    async fn clear(&self);

    // Number of stored entries (expired-but-unswept entries included).
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Cache key for a raw token: base64url(SHA-256(token)).
///
/// The raw token never becomes a map key, so a dump of the cache cannot be
/// replayed as bearer credentials.
pub fn cache_key(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Short prefix of a cache key, safe for log correlation.
pub fn key_fingerprint(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}
