use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::services::auth::options::{LocalOptions, SigningAlgorithm};
use crate::services::auth::principal::{ClaimTypeMapping, Principal};
use crate::services::auth::result::{ValidationFailure, ValidationResult};

/// Offline access-token verifier (signature, issuer, audience, lifetime).
///
/// - Key material is intentionally not printable via Debug.
/// - Stateless after construction; share it behind an `Arc` and call concurrently.
///
/// jsonwebtoken only verifies the signature here. Issuer, audience and lifetime
/// are checked afterwards, in that order, with exact string comparison, so each
/// failure maps to exactly one `ValidationFailure`.
#[derive(Clone)]
pub struct LocalValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    leeway_seconds: i64,
    claim_mapping: ClaimTypeMapping,
}

impl std::fmt::Debug for LocalValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("LocalValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl LocalValidator {
    pub fn new(
        options: &LocalOptions,
        claim_mapping: ClaimTypeMapping,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let pem = options.signing_key_pem.as_bytes();
        let decoding_key = match options.algorithm {
            SigningAlgorithm::EdDsa => DecodingKey::from_ed_pem(pem)?,
            SigningAlgorithm::Rs256 => DecodingKey::from_rsa_pem(pem)?,
            SigningAlgorithm::Es256 => DecodingKey::from_ec_pem(pem)?,
        };

        let mut validation = Validation::new(Algorithm::from(options.algorithm));
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            decoding_key,
            validation,
            issuer: options.issuer.clone(),
            audience: options.audience(),
            leeway_seconds: i64::try_from(options.leeway_seconds).unwrap_or(i64::MAX),
            claim_mapping,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn validate(&self, token: &str) -> ValidationResult {
        self.verify(token).into()
    }

    /// Verify the token and build the principal.
    pub fn verify(&self, token: &str) -> Result<Principal, ValidationFailure> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| {
            let reason = classify(e.kind());
            tracing::debug!(error = %e, reason = reason.as_str(), "local token decode failed");
            reason
        })?;

        let claims = data.claims;

        self.check_issuer(&claims)?;
        self.check_audience(&claims)?;
        self.check_lifetime(&claims, chrono::Utc::now().timestamp())?;

        Principal::from_claims(&claims, &self.claim_mapping)
    }

    fn check_issuer(&self, claims: &Map<String, Value>) -> Result<(), ValidationFailure> {
        match claims.get("iss") {
            Some(Value::String(iss)) if *iss == self.issuer => Ok(()),
            _ => Err(ValidationFailure::IssuerMismatch),
        }
    }

    // `aud` may be a string or an array of strings.
    fn check_audience(&self, claims: &Map<String, Value>) -> Result<(), ValidationFailure> {
        let matches = match claims.get("aud") {
            Some(Value::String(aud)) => *aud == self.audience,
            Some(Value::Array(auds)) => auds
                .iter()
                .any(|v| v.as_str() == Some(self.audience.as_str())),
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(ValidationFailure::AudienceMismatch)
        }
    }

    fn check_lifetime(&self, claims: &Map<String, Value>, now: i64) -> Result<(), ValidationFailure> {
        let exp = numeric_date(claims, "exp")?.ok_or(ValidationFailure::Malformed)?;
        if exp.saturating_add(self.leeway_seconds) < now {
            return Err(ValidationFailure::Expired);
        }

        // Not yet valid is reported as a lifetime failure as well.
        if let Some(nbf) = numeric_date(claims, "nbf")? {
            if nbf.saturating_sub(self.leeway_seconds) > now {
                return Err(ValidationFailure::Expired);
            }
        }

        Ok(())
    }
}

fn numeric_date(claims: &Map<String, Value>, name: &str) -> Result<Option<i64>, ValidationFailure> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            // NumericDate may carry a fraction
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or(ValidationFailure::Malformed),
        Some(_) => Err(ValidationFailure::Malformed),
    }
}

fn classify(kind: &ErrorKind) -> ValidationFailure {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::InvalidKeyFormat => {
            ValidationFailure::SignatureInvalid
        }
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => ValidationFailure::Expired,
        ErrorKind::InvalidIssuer => ValidationFailure::IssuerMismatch,
        ErrorKind::InvalidAudience => ValidationFailure::AudienceMismatch,
        _ => ValidationFailure::Malformed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::{
        AUDIENCE, ISSUER, SIGNING_PUBLIC_KEY_PEM, mint, mint_with_untrusted_key, now,
        valid_claims, with_claim,
    };
    use serde_json::json;

    fn options() -> LocalOptions {
        LocalOptions {
            issuer: ISSUER.to_string(),
            signing_key_pem: SIGNING_PUBLIC_KEY_PEM.to_string(),
            algorithm: SigningAlgorithm::EdDsa,
            leeway_seconds: 0,
        }
    }

    fn validator() -> LocalValidator {
        LocalValidator::new(&options(), ClaimTypeMapping::default()).unwrap()
    }

    #[test]
    fn valid_token_yields_principal() {
        let token = mint(&valid_claims());

        let principal = validator().verify(&token).unwrap();

        assert_eq!(principal.subject(), "818727");
        assert_eq!(principal.name(), Some("Alice"));
        assert_eq!(principal.roles(), &["IdentityManagerAdministrator".to_string()]);
        assert!(principal.has_scope("idmgr"));
        assert!(principal.has_scope("openid"));
    }

    #[test]
    fn claim_types_are_remapped() {
        let mapping = ClaimTypeMapping::new("display_name", "app_role");
        let v = LocalValidator::new(&options(), mapping).unwrap();
        let token = mint(&valid_claims());

        let principal = v.verify(&token).unwrap();

        assert_eq!(principal.claim_values("display_name"), &["Alice".to_string()]);
        assert_eq!(
            principal.claim_values("app_role"),
            &["IdentityManagerAdministrator".to_string()]
        );
        assert!(principal.claim_values("name").is_empty());
        assert!(principal.claim_values("role").is_empty());
    }

    #[test]
    fn audience_is_derived_from_issuer() {
        assert_eq!(validator().audience(), AUDIENCE);
    }

    #[test]
    fn untrusted_signature_is_rejected() {
        let token = mint_with_untrusted_key(&valid_claims());

        assert_eq!(
            validator().validate(&token),
            ValidationResult::Failure(ValidationFailure::SignatureInvalid)
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = mint(&valid_claims());
        let other = mint(&with_claim(valid_claims(), "sub", json!("someone-else")));

        // header.payload.signature: splice the other payload under the original signature
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(
            validator().validate(&forged),
            ValidationResult::Failure(ValidationFailure::SignatureInvalid)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        for token in ["", "not-a-jwt", "a.b", "a.b.c", "opaque-reference-token-0123456789"] {
            assert_eq!(
                validator().validate(token),
                ValidationResult::Failure(ValidationFailure::Malformed),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let claims = with_claim(valid_claims(), "iss", json!("https://evil.example.com/"));

        assert_eq!(
            validator().validate(&mint(&claims)),
            ValidationResult::Failure(ValidationFailure::IssuerMismatch)
        );
    }

    #[test]
    fn issuer_comparison_is_exact() {
        // configured issuer has a trailing slash; the token's does not
        let claims = with_claim(valid_claims(), "iss", json!("https://idp.example.com"));

        assert_eq!(
            validator().validate(&mint(&claims)),
            ValidationResult::Failure(ValidationFailure::IssuerMismatch)
        );
    }

    #[test]
    fn singular_resource_audience_is_rejected() {
        let claims = with_claim(valid_claims(), "aud", json!("https://idp.example.com/resource"));

        assert_eq!(
            validator().validate(&mint(&claims)),
            ValidationResult::Failure(ValidationFailure::AudienceMismatch)
        );
    }

    #[test]
    fn audience_array_containing_expected_value_is_accepted() {
        let claims = with_claim(
            valid_claims(),
            "aud",
            json!(["https://other.example.com", AUDIENCE]),
        );

        assert!(validator().validate(&mint(&claims)).is_success());
    }

    #[test]
    fn missing_audience_is_rejected() {
        let mut claims = valid_claims();
        claims.as_object_mut().unwrap().remove("aud");

        assert_eq!(
            validator().validate(&mint(&claims)),
            ValidationResult::Failure(ValidationFailure::AudienceMismatch)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = with_claim(valid_claims(), "exp", json!(now() - 120));

        assert_eq!(
            validator().validate(&mint(&claims)),
            ValidationResult::Failure(ValidationFailure::Expired)
        );
    }

    #[test]
    fn leeway_tolerates_small_clock_skew() {
        let mut opts = options();
        opts.leeway_seconds = 300;
        let v = LocalValidator::new(&opts, ClaimTypeMapping::default()).unwrap();
        let claims = with_claim(valid_claims(), "exp", json!(now() - 120));

        assert!(v.validate(&mint(&claims)).is_success());
    }

    #[test]
    fn not_yet_valid_token_is_rejected() {
        let claims = with_claim(valid_claims(), "nbf", json!(now() + 3600));

        assert_eq!(
            validator().validate(&mint(&claims)),
            ValidationResult::Failure(ValidationFailure::Expired)
        );
    }

    #[test]
    fn token_without_exp_is_malformed() {
        let mut claims = valid_claims();
        claims.as_object_mut().unwrap().remove("exp");

        assert_eq!(
            validator().validate(&mint(&claims)),
            ValidationResult::Failure(ValidationFailure::Malformed)
        );
    }

    #[test]
    fn invalid_key_pem_fails_construction() {
        let mut opts = options();
        opts.signing_key_pem = "not a pem".to_string();

        assert!(LocalValidator::new(&opts, ClaimTypeMapping::default()).is_err());
    }
}
