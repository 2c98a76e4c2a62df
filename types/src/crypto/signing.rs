// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! ES256 signing and verification of compact tokens.
//!
//! Key material is configured as JWKs (`{"crv": "P-256", "kty": "EC", ...}`).
//! `jsonwebtoken` only accepts DER or PEM encoded private EC keys, so the
//! private part of a JWK is rebuilt into a PKCS#8 document first.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, DecodingKey, EncodingKey, Header};
use p256::pkcs8::EncodePrivateKey;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use jsonwebtoken::{Algorithm, Validation};

use super::{JwkError, SigningError};

/// The subset of JWK fields needed for EC keys.
#[derive(Deserialize)]
struct EcJwk {
    kty: String,
    crv: String,
    x: String,
    y: String,
    d: Option<String>,
}

impl EcJwk {
    fn from_json(jwk: &str) -> Result<Self, JwkError> {
        let jwk: EcJwk = serde_json::from_str(jwk)?;
        if jwk.kty != "EC" || jwk.crv != "P-256" {
            return Err(JwkError::UnsupportedKeyType);
        }
        Ok(jwk)
    }
}

/// The service's private signing key for work order tokens.
pub struct SigningKey {
    encoding: EncodingKey,
    public_x: String,
    public_y: String,
}

impl SigningKey {
    /// Build a signing key from a private ES256 JWK.
    pub fn from_jwk(jwk: &str) -> Result<Self, JwkError> {
        let jwk = EcJwk::from_json(jwk)?;
        let d = jwk.d.as_deref().ok_or(JwkError::MissingPrivatePart)?;
        let d = URL_SAFE_NO_PAD
            .decode(d)
            .map_err(|_| JwkError::InvalidCoordinates)?;
        let secret =
            p256::SecretKey::from_slice(&d).map_err(|_| JwkError::InvalidCoordinates)?;
        let document = secret
            .to_pkcs8_der()
            .map_err(|_| JwkError::InvalidCoordinates)?;
        Ok(Self {
            encoding: EncodingKey::from_ec_der(document.as_bytes()),
            public_x: jwk.x,
            public_y: jwk.y,
        })
    }

    /// Sign the given claims as a compact ES256 token.
    ///
    /// The header is fixed to `{"alg": "ES256", "typ": "JWT"}`.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, SigningError> {
        let token = encode(&Header::new(Algorithm::ES256), claims, &self.encoding)?;
        Ok(token)
    }

    /// The verifying key matching this signing key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            decoding: DecodingKey::from_ec_components(&self.public_x, &self.public_y)
                .expect("verifying key was derived from a validated JWK"),
        }
    }
}

/// A public ES256 key used to verify compact tokens.
#[derive(Clone)]
pub struct VerifyingKey {
    decoding: DecodingKey,
}

impl VerifyingKey {
    /// Build a verifying key from a public ES256 JWK.
    pub fn from_jwk(jwk: &str) -> Result<Self, JwkError> {
        let jwk = EcJwk::from_json(jwk)?;
        let decoding = DecodingKey::from_ec_components(&jwk.x, &jwk.y)
            .map_err(|_| JwkError::InvalidCoordinates)?;
        Ok(Self { decoding })
    }

    /// Verify a compact token and deserialize its claims.
    pub fn verify<C: DeserializeOwned>(
        &self,
        token: &str,
        validation: &Validation,
    ) -> Result<C, jsonwebtoken::errors::Error> {
        let data = jsonwebtoken::decode::<C>(token, &self.decoding, validation)?;
        Ok(data.claims)
    }
}

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    /// Generate a fresh ES256 keypair as (private JWK, public JWK) strings.
    pub fn generate_jwk_pair() -> (String, String) {
        let secret = p256::SecretKey::random(&mut rand::thread_rng());
        let point = secret.public_key().to_encoded_point(false);
        let x = URL_SAFE_NO_PAD.encode(point.x().unwrap());
        let y = URL_SAFE_NO_PAD.encode(point.y().unwrap());
        let d = URL_SAFE_NO_PAD.encode(secret.to_bytes());
        let private = format!(
            r#"{{"kty": "EC", "crv": "P-256", "x": "{x}", "y": "{y}", "d": "{d}"}}"#
        );
        let public = format!(r#"{{"kty": "EC", "crv": "P-256", "x": "{x}", "y": "{y}"}}"#);
        (private, public)
    }
}
