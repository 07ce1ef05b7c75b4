//! Remote access-token validation against the authority's validation endpoint.
//!
//! The endpoint is authoritative for tokens the local key cannot verify
//! (reference tokens, tokens issued elsewhere). Results are cached by token
//! digest to avoid a network round-trip per request.
//!
//! # Protocol
//!
//! `POST <endpoint>` with `Authorization: Bearer <token>` and a form body
//! carrying the token (plus client credentials when configured).
//!
//! - 2xx + JSON object: the token's claims -> `Success`
//! - 4xx: the authority rejected the token -> `EndpointRejected` (never retried).
//!   401/403 may be about our client credentials rather than the token, so they
//!   are not cached.
//! - 408, 429, 5xx, transport error, timeout: transient, retried once after a
//!   backoff, then `EndpointUnreachable`
//! - 2xx with an unusable body -> `EndpointUnreachable`
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::services::auth::options::EndpointOptions;
use crate::services::auth::principal::{ClaimTypeMapping, Principal};
use crate::services::auth::result::{ValidationFailure, ValidationResult};
use crate::services::cache::{ValidationResultCache, cache_key, key_fingerprint};

/// Cache wiring for endpoint results.
#[derive(Clone)]
pub struct EndpointCache {
    pub store: Arc<dyn ValidationResultCache>,
    pub ttl: Duration,
    pub failure_ttl: Duration,
}

impl std::fmt::Debug for EndpointCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointCache")
            .field("backend", &self.store.backend_name())
            .field("ttl", &self.ttl)
            .field("failure_ttl", &self.failure_ttl)
            .finish()
    }
}

enum Attempt {
    Accepted(Map<String, Value>),
    Rejected(StatusCode),
    // The endpoint refused the caller; says nothing reliable about the token.
    Refused(StatusCode),
    // Worth one retry: transport error, timeout, 5xx
    Transient(String),
    // Not worth a retry: the endpoint answered, but with something unusable
    Unusable(String),
}

#[derive(Debug)]
pub struct EndpointValidator {
    http: reqwest::Client,
    options: EndpointOptions,
    claim_mapping: ClaimTypeMapping,
    cache: Option<EndpointCache>,
}

impl EndpointValidator {
    pub fn new(
        options: EndpointOptions,
        claim_mapping: ClaimTypeMapping,
        cache: Option<EndpointCache>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            http,
            options,
            claim_mapping,
            cache,
        })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.options.url
    }

    /// Validate via cache, then the remote endpoint.
    ///
    /// Dropping the returned future cancels the outbound call.
    #[instrument(skip_all, name = "auth.endpoint.validate")]
    pub async fn validate(&self, token: &str) -> ValidationResult {
        let Some(cache) = &self.cache else {
            return self.call_endpoint(token).await.0;
        };

        let key = cache_key(token);
        if let Some(hit) = cache.store.get(&key).await {
            tracing::debug!(key = key_fingerprint(&key), "validation cache hit");
            return hit;
        }

        let (result, cacheable) = self.call_endpoint(token).await;

        let ttl = match &result {
            _ if !cacheable => Duration::ZERO,
            ValidationResult::Success(principal) => success_ttl(principal, cache.ttl),
            ValidationResult::Failure(ValidationFailure::EndpointRejected) => cache.failure_ttl,
            // An outage must not outlive itself in the cache.
            ValidationResult::Failure(_) => Duration::ZERO,
        };
        if !ttl.is_zero() {
            cache.store.put(&key, result.clone(), ttl).await;
            tracing::debug!(
                key = key_fingerprint(&key),
                ttl_secs = ttl.as_secs(),
                "validation result cached"
            );
        }

        result
    }

    /// The result, and whether it says something about the token worth caching.
    async fn call_endpoint(&self, token: &str) -> (ValidationResult, bool) {
        let mut attempt = self.attempt(token).await;

        if let Attempt::Transient(reason) = &attempt {
            tracing::warn!(
                endpoint = %self.options.url,
                reason = %reason,
                backoff_ms = self.options.retry_backoff.as_millis() as u64,
                "validation endpoint call failed, retrying once"
            );
            tokio::time::sleep(self.options.retry_backoff).await;
            attempt = self.attempt(token).await;
        }

        match attempt {
            Attempt::Accepted(claims) => match Principal::from_claims(&claims, &self.claim_mapping) {
                Ok(principal) => (ValidationResult::success(principal), true),
                Err(reason) => {
                    tracing::warn!(
                        reason = reason.as_str(),
                        "validation endpoint returned claims without a subject"
                    );
                    (ValidationFailure::EndpointUnreachable.into(), false)
                }
            },
            Attempt::Rejected(status) => {
                tracing::debug!(status = %status, "validation endpoint rejected token");
                (ValidationFailure::EndpointRejected.into(), true)
            }
            Attempt::Refused(status) => {
                tracing::warn!(
                    endpoint = %self.options.url,
                    status = %status,
                    client_credentials = self.options.credentials.is_some(),
                    "validation endpoint refused the request"
                );
                (ValidationFailure::EndpointRejected.into(), false)
            }
            Attempt::Transient(reason) | Attempt::Unusable(reason) => {
                tracing::error!(
                    endpoint = %self.options.url,
                    reason = %reason,
                    "validation endpoint unreachable"
                );
                (ValidationFailure::EndpointUnreachable.into(), false)
            }
        }
    }

    async fn attempt(&self, token: &str) -> Attempt {
        let mut form: Vec<(&str, &str)> = vec![("token", token)];
        if let Some(creds) = &self.options.credentials {
            form.push(("client_id", creds.client_id.as_str()));
            form.push(("client_secret", creds.client_secret.as_str()));
        }

        let response = match self
            .http
            .post(self.options.url.clone())
            .bearer_auth(token)
            .form(&form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Attempt::Transient("timeout".to_string()),
            Err(e) => return Attempt::Transient(e.without_url().to_string()),
        };

        let status = response.status();
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                return Attempt::Transient(format!("status {status}"));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Attempt::Refused(status),
            s if s.is_client_error() => return Attempt::Rejected(status),
            s if !s.is_success() => return Attempt::Transient(format!("status {status}")),
            _ => {}
        }

        match response.json::<Value>().await {
            Ok(Value::Object(claims)) => Attempt::Accepted(claims),
            Ok(_) => Attempt::Unusable("response is not a JSON object".to_string()),
            Err(e) if e.is_timeout() => Attempt::Transient("timeout".to_string()),
            Err(e) => Attempt::Unusable(e.without_url().to_string()),
        }
    }
}

/// Success TTL is capped by the token's own `exp` when the endpoint reports one.
fn success_ttl(principal: &Principal, configured: Duration) -> Duration {
    let Some(exp) = principal
        .claim_values("exp")
        .first()
        .and_then(|v| v.parse::<f64>().ok())
    else {
        return configured;
    };

    let remaining = exp as i64 - chrono::Utc::now().timestamp();
    if remaining <= 0 {
        return Duration::ZERO;
    }
    configured.min(Duration::from_secs(remaining as u64))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn principal(claims: Value) -> Principal {
        Principal::from_claims(claims.as_object().unwrap(), &ClaimTypeMapping::default()).unwrap()
    }

    #[test]
    fn ttl_without_exp_is_configured_ttl() {
        let p = principal(json!({"sub": "1"}));
        assert_eq!(success_ttl(&p, Duration::from_secs(300)), Duration::from_secs(300));
    }

    #[test]
    fn ttl_is_capped_by_exp() {
        let exp = chrono::Utc::now().timestamp() + 60;
        let p = principal(json!({"sub": "1", "exp": exp}));

        let ttl = success_ttl(&p, Duration::from_secs(300));
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl >= Duration::from_secs(58));
    }

    #[test]
    fn elapsed_exp_is_not_cached() {
        let exp = chrono::Utc::now().timestamp() - 1;
        let p = principal(json!({"sub": "1", "exp": exp}));

        assert_eq!(success_ttl(&p, Duration::from_secs(300)), Duration::ZERO);
    }
}
