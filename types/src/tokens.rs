// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! The two credentials issued by the service: the opaque work package
//! access token and the signed per-file work order token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::dataset::WorkType;
use crate::identifiers::WorkPackageId;
use crate::time::TimeStamp;

/// Number of random bytes behind an access token secret.
const ACCESS_TOKEN_SECRET_BYTES: usize = 24;

/// How long a signed work order token stays valid. Work order tokens are
/// minted per request and presented immediately, so the window is short.
pub const WORK_ORDER_TOKEN_VALID_SECONDS: i64 = 30;

/// A work package access token of the form `"{work_package_id}:{secret}"`.
///
/// The secret is never persisted; the store keeps only its SHA-256
/// fingerprint, so a leaked database cannot be replayed against the
/// service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    work_package_id: WorkPackageId,
    secret: String,
}

#[derive(Debug, Error)]
#[error("Invalid access token")]
pub struct InvalidAccessToken;

impl AccessToken {
    /// Mint a fresh token for the given work package.
    pub fn generate(work_package_id: WorkPackageId) -> Self {
        let mut bytes = [0u8; ACCESS_TOKEN_SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            work_package_id,
            secret: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// Parse a presented token string.
    pub fn parse(presented: &str) -> Result<Self, InvalidAccessToken> {
        let (id, secret) = presented.split_once(':').ok_or(InvalidAccessToken)?;
        if secret.is_empty() {
            return Err(InvalidAccessToken);
        }
        let work_package_id = id.parse().map_err(|_| InvalidAccessToken)?;
        Ok(Self {
            work_package_id,
            secret: secret.to_owned(),
        })
    }

    pub fn work_package_id(&self) -> &WorkPackageId {
        &self.work_package_id
    }

    /// The SHA-256 fingerprint of the secret, lowercase hex.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.secret)
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.work_package_id, self.secret)
    }
}

/// SHA-256 of the given secret string as lowercase hex.
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// The claims of a work order token.
///
/// Signed with the service's ES256 key, then encrypted to the user's
/// public Crypt4GH key, and consumed by the data plane services.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderToken {
    #[serde(rename = "type")]
    pub work_type: WorkType,
    pub file_id: String,
    pub user_id: String,
    pub user_public_crypt4gh_key: String,
    pub full_user_name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl WorkOrderToken {
    /// Build the claims for a token minted right now.
    pub fn new(
        work_type: WorkType,
        file_id: String,
        user_id: String,
        user_public_crypt4gh_key: String,
        full_user_name: String,
        email: String,
    ) -> Self {
        let iat = TimeStamp::now().as_unix_seconds();
        Self {
            work_type,
            file_id,
            user_id,
            user_public_crypt4gh_key,
            full_user_name,
            email,
            iat,
            exp: iat + WORK_ORDER_TOKEN_VALID_SECONDS,
        }
    }
}
