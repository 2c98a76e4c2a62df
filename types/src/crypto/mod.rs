// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Cryptographic building blocks: recipient-bound envelope encryption for
//! tokens handed out to users, and ES256 signing of work order tokens.

mod errors;
pub mod seal;
pub mod signing;

pub use errors::{DecryptionError, EncryptionError, InvalidUserKeyError, JwkError, SigningError};
