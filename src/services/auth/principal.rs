/*
 * Responsibility
 * - Authenticated identity (Principal) derived from a validated token
 * - Claim collection from a JSON payload (JWT claims or endpoint response)
 * - name/role claim-type remapping to the application's expected types
 */
use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::services::auth::result::ValidationFailure;

/// Claim type the issuer uses for the display name.
pub const ISSUER_NAME_CLAIM: &str = "name";
/// Claim type the issuer uses for roles.
pub const ISSUER_ROLE_CLAIM: &str = "role";

const SUBJECT_CLAIM: &str = "sub";
const CLIENT_ID_CLAIM: &str = "client_id";
const SCOPE_CLAIM: &str = "scope";

/// Rewrites the issuer's name/role claim types to the ones the application reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimTypeMapping {
    pub name_claim_type: String,
    pub role_claim_type: String,
}

impl Default for ClaimTypeMapping {
    fn default() -> Self {
        Self {
            name_claim_type: ISSUER_NAME_CLAIM.to_string(),
            role_claim_type: ISSUER_ROLE_CLAIM.to_string(),
        }
    }
}

impl ClaimTypeMapping {
    pub fn new(name_claim_type: impl Into<String>, role_claim_type: impl Into<String>) -> Self {
        Self {
            name_claim_type: name_claim_type.into(),
            role_claim_type: role_claim_type.into(),
        }
    }

    fn apply(&self, claims: &mut BTreeMap<String, Vec<String>>) {
        move_claim(claims, ISSUER_NAME_CLAIM, &self.name_claim_type);
        move_claim(claims, ISSUER_ROLE_CLAIM, &self.role_claim_type);
    }
}

fn move_claim(claims: &mut BTreeMap<String, Vec<String>>, from: &str, to: &str) {
    if from == to {
        return;
    }
    if let Some(values) = claims.remove(from) {
        claims.entry(to.to_string()).or_default().extend(values);
    }
}

/// The validated identity attached to a request.
///
/// - `subject` is `sub`, or `client_id` for client-credential tokens
/// - `claims` keeps multi-valued claims (e.g. several roles) in issuer order
/// - `scopes` only ever contains what the validating authority granted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    claims: BTreeMap<String, Vec<String>>,
    scopes: BTreeSet<String>,
    name_claim_type: String,
    role_claim_type: String,
}

impl Principal {
    /// Build a principal from a JSON claim set, applying the claim-type mapping.
    pub fn from_claims(
        payload: &Map<String, Value>,
        mapping: &ClaimTypeMapping,
    ) -> Result<Self, ValidationFailure> {
        let mut claims = collect_claims(payload);

        let subject = first_non_empty(&claims, SUBJECT_CLAIM)
            .or_else(|| first_non_empty(&claims, CLIENT_ID_CLAIM))
            .ok_or(ValidationFailure::Malformed)?;

        let scopes = claims
            .get(SCOPE_CLAIM)
            .map(|values| {
                values
                    .iter()
                    .flat_map(|v| v.split_whitespace())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        mapping.apply(&mut claims);

        Ok(Self {
            subject,
            claims,
            scopes,
            name_claim_type: mapping.name_claim_type.clone(),
            role_claim_type: mapping.role_claim_type.clone(),
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn claims(&self) -> &BTreeMap<String, Vec<String>> {
        &self.claims
    }

    pub fn claim_values(&self, claim_type: &str) -> &[String] {
        self.claims
            .get(claim_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn name(&self) -> Option<&str> {
        self.claim_values(&self.name_claim_type)
            .first()
            .map(String::as_str)
    }

    pub fn roles(&self) -> &[String] {
        self.claim_values(&self.role_claim_type)
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Adds a claim value. Used by claims transformations; the `scope` claim is
    /// not writable this way so a transformation cannot grant scopes.
    pub fn add_claim(&mut self, claim_type: impl Into<String>, value: impl Into<String>) {
        let claim_type = claim_type.into();
        if claim_type == SCOPE_CLAIM {
            return;
        }
        self.claims.entry(claim_type).or_default().push(value.into());
    }
}

fn first_non_empty(claims: &BTreeMap<String, Vec<String>>, claim_type: &str) -> Option<String> {
    claims
        .get(claim_type)
        .and_then(|values| values.first())
        .filter(|v| !v.trim().is_empty())
        .cloned()
}

fn collect_claims(payload: &Map<String, Value>) -> BTreeMap<String, Vec<String>> {
    let mut claims: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (claim_type, value) in payload {
        let values: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
            other => scalar_to_string(other).into_iter().collect(),
        };
        if !values.is_empty() {
            claims.insert(claim_type.clone(), values);
        }
    }

    claims
}

// Nested objects and nulls carry no claim value we can expose.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
