/*
 * Responsibility
 * - Response DTOs for the authenticated-identity endpoints
 */
use std::collections::BTreeMap;

use serde::Serialize;

use crate::services::auth::Principal;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub scopes: Vec<String>,
    pub claims: BTreeMap<String, Vec<String>>,
}

impl From<&Principal> for MeResponse {
    fn from(p: &Principal) -> Self {
        Self {
            subject: p.subject().to_string(),
            name: p.name().map(str::to_string),
            roles: p.roles().to_vec(),
            scopes: p.scopes().iter().cloned().collect(),
            claims: p.claims().clone(),
        }
    }
}

// The token itself is never echoed back.
#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    pub preserved: bool,
}
