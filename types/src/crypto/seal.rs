// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Single-recipient envelope encryption used to bind tokens to the user
//! that requested them: X25519 key agreement against the user's public
//! Crypt4GH key, HKDF-SHA256 key derivation and ChaCha20-Poly1305.
//!
//! The envelope layout is `ephemeral public key (32) || nonce (12) ||
//! ciphertext`, base64 encoded. Only the holder of the matching secret key
//! can open it, so a token intercepted in transit is worthless.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use super::{DecryptionError, EncryptionError, InvalidUserKeyError};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const HKDF_INFO: &[u8] = b"work-package-envelope";

/// A user's public Crypt4GH key.
///
/// Accepts the raw base64 encoding as well as PEM-armored input; the armor
/// lines are stripped. Anything that looks like private key material is
/// rejected outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserPublicKey {
    key: [u8; KEY_SIZE],
    base64: String,
}

impl UserPublicKey {
    pub fn parse(value: &str) -> Result<Self, InvalidUserKeyError> {
        if value.trim().is_empty() {
            return Err(InvalidUserKeyError::Empty);
        }
        let mut stripped = String::with_capacity(value.len());
        for line in value.lines() {
            let line = line.trim();
            if line.starts_with('-') && line.ends_with('-') {
                if line.contains("PRIVATE") {
                    return Err(InvalidUserKeyError::PrivateKeyMaterial);
                }
                // PEM armor, e.g. "-----BEGIN CRYPT4GH PUBLIC KEY-----"
                continue;
            }
            stripped.push_str(line);
        }
        let bytes = BASE64
            .decode(stripped.as_bytes())
            .map_err(|_| InvalidUserKeyError::Undecodable)?;
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| InvalidUserKeyError::WrongLength)?;
        Ok(Self {
            key,
            base64: stripped,
        })
    }

    /// The normalized base64 encoding, as persisted and put into claims.
    pub fn as_base64(&self) -> &str {
        &self.base64
    }

    /// Encrypt the given payload so that only this key's holder can read it.
    pub fn seal(&self, payload: &[u8]) -> Result<String, EncryptionError> {
        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&PublicKey::from(self.key));

        let aead_key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), &self.key);
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&aead_key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| EncryptionError::AeadFailure)?;

        let mut envelope = Vec::with_capacity(KEY_SIZE + NONCE_SIZE + ciphertext.len());
        envelope.extend_from_slice(ephemeral_public.as_bytes());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(envelope))
    }
}

/// The secret half of a user keypair.
///
/// The service itself never holds user secret keys; this type exists for
/// client-side tooling and for tests that verify the envelope round-trip.
pub struct UserSecretKey {
    secret: StaticSecret,
}

impl UserSecretKey {
    /// Generate a fresh keypair.
    pub fn generate() -> (Self, UserPublicKey) {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        let public_key = UserPublicKey {
            key: public.to_bytes(),
            base64: BASE64.encode(public.as_bytes()),
        };
        (Self { secret }, public_key)
    }

    /// Open a base64-encoded envelope produced by [`UserPublicKey::seal`].
    pub fn open(&self, envelope: &str) -> Result<Vec<u8>, DecryptionError> {
        let envelope = BASE64
            .decode(envelope.as_bytes())
            .map_err(|_| DecryptionError::MalformedEnvelope)?;
        if envelope.len() < KEY_SIZE + NONCE_SIZE {
            return Err(DecryptionError::MalformedEnvelope);
        }
        let (ephemeral_public, rest) = envelope.split_at(KEY_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

        let ephemeral_public: [u8; KEY_SIZE] = ephemeral_public
            .try_into()
            .map_err(|_| DecryptionError::MalformedEnvelope)?;
        let own_public = PublicKey::from(&self.secret);
        let shared = self.secret.diffie_hellman(&PublicKey::from(ephemeral_public));

        let aead_key = derive_key(shared.as_bytes(), &ephemeral_public, own_public.as_bytes());
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&aead_key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DecryptionError::AeadFailure)
    }
}

/// Derive the AEAD key from the shared secret, bound to both public keys.
fn derive_key(shared: &[u8], ephemeral_public: &[u8], recipient_public: &[u8]) -> [u8; KEY_SIZE] {
    let mut salt = Vec::with_capacity(2 * KEY_SIZE);
    salt.extend_from_slice(ephemeral_public);
    salt.extend_from_slice(recipient_public);
    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut key = [0u8; KEY_SIZE];
    hkdf.expand(HKDF_INFO, &mut key)
        .expect("HKDF output length is valid");
    key
}
