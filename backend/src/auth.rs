// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Verification of internal identity assertions.
//!
//! Callers of the work package creation and dataset listing endpoints
//! present a bearer token minted by the upstream auth service. The
//! verifier checks its ES256 signature against the configured public key
//! and extracts the user context. Every failure collapses into
//! [`NotAuthenticated`]; the reason is logged, never surfaced.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use wpstypes::crypto::signing::{Algorithm, Validation, VerifyingKey};
use wpstypes::crypto::JwkError;

/// Configuration for validating internal identity assertions.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    /// The public JWK of the upstream auth service.
    pub auth_key: String,
    /// Accepted signing algorithms.
    #[serde(default = "default_auth_algs")]
    pub auth_algs: Vec<String>,
    /// Claims that must be present in every assertion.
    #[serde(default = "default_check_claims")]
    pub auth_check_claims: Vec<String>,
}

fn default_auth_algs() -> Vec<String> {
    vec!["ES256".into()]
}

fn default_check_claims() -> Vec<String> {
    ["id", "name", "email", "iat", "exp"]
        .map(String::from)
        .to_vec()
}

/// The identity extracted from a verified internal assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Academic title, if any.
    pub title: Option<String>,
}

impl UserContext {
    /// The user's full name with the academic title prefixed.
    pub fn full_name(&self) -> String {
        match &self.title {
            Some(title) => format!("{title} {}", self.name),
            None => self.name.clone(),
        }
    }
}

/// The caller could not be authenticated.
#[derive(Debug, Error)]
#[error("Not authenticated")]
pub struct NotAuthenticated;

/// The verifier could not be built from its configuration.
#[derive(Debug, Error)]
pub enum AuthConfigError {
    #[error("Invalid auth key: {0}")]
    InvalidKey(#[from] JwkError),
    #[error("Unknown signing algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Validates internal bearer assertions and extracts the user context.
#[derive(Clone)]
pub struct IdentityVerifier {
    key: VerifyingKey,
    validation: Validation,
    check_claims: Vec<String>,
}

impl IdentityVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthConfigError> {
        let key = VerifyingKey::from_jwk(&config.auth_key)?;
        let algorithms = config
            .auth_algs
            .iter()
            .map(|alg| {
                Algorithm::from_str(alg).map_err(|_| AuthConfigError::UnknownAlgorithm(alg.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let first = *algorithms
            .first()
            .ok_or_else(|| AuthConfigError::UnknownAlgorithm("<none>".into()))?;
        let mut validation = Validation::new(first);
        validation.algorithms = algorithms;
        Ok(Self {
            key,
            validation,
            check_claims: config.auth_check_claims.clone(),
        })
    }

    /// Verify an assertion and return the caller's identity.
    pub fn verify(&self, assertion: &str) -> Result<UserContext, NotAuthenticated> {
        let claims: Value = self.key.verify(assertion, &self.validation).map_err(|error| {
            debug!(%error, "Rejecting internal assertion");
            NotAuthenticated
        })?;
        for claim in &self.check_claims {
            if claims.get(claim).map_or(true, Value::is_null) {
                debug!(claim, "Internal assertion is missing a required claim");
                return Err(NotAuthenticated);
            }
        }
        let as_string = |claim: &str| {
            claims
                .get(claim)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or(NotAuthenticated)
        };
        Ok(UserContext {
            id: as_string("id")?,
            name: as_string("name")?,
            email: as_string("email")?,
            title: claims
                .get("title")
                .and_then(Value::as_str)
                .filter(|title| !title.is_empty())
                .map(str::to_owned),
        })
    }
}
