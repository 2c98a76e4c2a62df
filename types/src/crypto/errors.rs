// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// A user-supplied public key could not be accepted.
#[derive(Debug, Error)]
pub enum InvalidUserKeyError {
    /// The key is empty or whitespace only.
    #[error("Key must be a non-empty string")]
    Empty,
    /// The value contains private key material.
    #[error("Do not pass a private key")]
    PrivateKeyMaterial,
    /// The key is not valid base64.
    #[error("Key is not valid base64")]
    Undecodable,
    /// The decoded key does not have the expected length.
    #[error("Key has an invalid length")]
    WrongLength,
}

/// Envelope encryption failed.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Could not encrypt payload")]
    AeadFailure,
}

/// An envelope could not be opened.
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// The envelope is too short or not valid base64.
    #[error("Malformed envelope")]
    MalformedEnvelope,
    /// Authentication of the ciphertext failed.
    #[error("Could not decrypt envelope")]
    AeadFailure,
}

/// A configured JWK could not be used.
#[derive(Debug, Error)]
pub enum JwkError {
    #[error("Key is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Key is not an EC key on curve P-256")]
    UnsupportedKeyType,
    #[error("No private signing key found")]
    MissingPrivatePart,
    #[error("Key coordinates are invalid")]
    InvalidCoordinates,
}

/// Signing a token failed.
#[derive(Debug, Error)]
#[error("Could not sign token: {0}")]
pub struct SigningError(#[from] jsonwebtoken::errors::Error);
