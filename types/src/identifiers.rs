// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of random bytes behind a work package identifier.
const WORK_PACKAGE_ID_BYTES: usize = 20;

/// The opaque identifier of a work package.
///
/// Identifiers are the URL-safe base64 encoding of 20 random bytes, so they
/// can appear in URL paths and as the public prefix of an access token
/// without further escaping.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct WorkPackageId(String);

impl WorkPackageId {
    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        let mut bytes = [0u8; WORK_PACKAGE_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WorkPackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("Invalid work package id")]
pub struct InvalidWorkPackageId;

impl FromStr for WorkPackageId {
    type Err = InvalidWorkPackageId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| InvalidWorkPackageId)?;
        if bytes.len() != WORK_PACKAGE_ID_BYTES {
            return Err(InvalidWorkPackageId);
        }
        Ok(Self(value.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_distinct_and_parseable() {
        let id = WorkPackageId::random();
        let other = WorkPackageId::random();
        assert_ne!(id, other);
        let parsed: WorkPackageId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("".parse::<WorkPackageId>().is_err());
        assert!("not/base64url!".parse::<WorkPackageId>().is_err());
        // valid base64url, wrong length
        assert!("AAAA".parse::<WorkPackageId>().is_err());
    }
}
