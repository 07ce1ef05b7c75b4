//! Outcome of validating one access token.
//!
//! Failures are values, never errors raised up the stack: middleware turns
//! them into "no principal attached" and logs the reason internally.
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::services::auth::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ValidationFailure {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token issuer does not match")]
    IssuerMismatch,
    #[error("token audience does not match")]
    AudienceMismatch,
    #[error("token is expired")]
    Expired,
    #[error("validation endpoint is unreachable")]
    EndpointUnreachable,
    #[error("validation endpoint rejected the token")]
    EndpointRejected,
}

impl ValidationFailure {
    /// Stable snake_case name used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::SignatureInvalid => "signature_invalid",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::AudienceMismatch => "audience_mismatch",
            Self::Expired => "expired",
            Self::EndpointUnreachable => "endpoint_unreachable",
            Self::EndpointRejected => "endpoint_rejected",
        }
    }
}

impl FromStr for ValidationFailure {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "malformed" => Ok(Self::Malformed),
            "signature_invalid" => Ok(Self::SignatureInvalid),
            "issuer_mismatch" => Ok(Self::IssuerMismatch),
            "audience_mismatch" => Ok(Self::AudienceMismatch),
            "expired" => Ok(Self::Expired),
            "endpoint_unreachable" => Ok(Self::EndpointUnreachable),
            "endpoint_rejected" => Ok(Self::EndpointRejected),
            _ => Err(()),
        }
    }
}

/// `Success` shares the principal so cache hits hand out the same identity
/// without deep-cloning claim maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Success(Arc<Principal>),
    Failure(ValidationFailure),
}

impl ValidationResult {
    pub fn success(principal: Principal) -> Self {
        Self::Success(Arc::new(principal))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure(&self) -> Option<ValidationFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(*reason),
        }
    }

    pub fn principal(&self) -> Option<&Arc<Principal>> {
        match self {
            Self::Success(principal) => Some(principal),
            Self::Failure(_) => None,
        }
    }
}

impl From<ValidationFailure> for ValidationResult {
    fn from(reason: ValidationFailure) -> Self {
        Self::Failure(reason)
    }
}

impl From<Result<Principal, ValidationFailure>> for ValidationResult {
    fn from(r: Result<Principal, ValidationFailure>) -> Self {
        match r {
            Ok(principal) => Self::success(principal),
            Err(reason) => Self::Failure(reason),
        }
    }
}
