//! RSA signing keys for locally issued tokens.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rootcause::Report;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use std::fmt;

use crate::error::KeyError;
use crate::jwks::{Jwk, Jwks};

/// A parsed signing key pair and its published JWK.
#[derive(Clone)]
pub struct SigningKeys {
    encoding: EncodingKey,
    jwk: Jwk,
}

impl SigningKeys {
    /// Parses a PEM key pair. Either key may be PKCS#1 or PKCS#8/SPKI
    /// encoded; the public key must belong to the private key.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, Report<KeyError>> {
        let private = RsaPrivateKey::from_pkcs1_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(private_pem))
            .map_err(|e| KeyError::InvalidPrivateKey {
                reason: e.to_string(),
            })?;

        let public = RsaPublicKey::from_public_key_pem(public_pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_pem))
            .map_err(|e| KeyError::InvalidPublicKey {
                reason: e.to_string(),
            })?;

        if private.to_public_key() != public {
            return Err(KeyError::Mismatch.into());
        }

        let encoding =
            EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(|e| {
                KeyError::InvalidPrivateKey {
                    reason: e.to_string(),
                }
            })?;

        Ok(Self {
            encoding,
            jwk: Jwk::from_rsa(&public),
        })
    }

    /// Returns the key id placed in token headers.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.jwk.kid
    }

    #[must_use]
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// Returns the key set to publish.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.jwk.clone()],
        }
    }

    /// Signs claims as an RS256 JWT carrying this key's id.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, Report<KeyError>> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.jwk.kid.clone());

        Ok(
            jsonwebtoken::encode(&header, claims, &self.encoding).map_err(|e| KeyError::Sign {
                reason: e.to_string(),
            })?,
        )
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("kid", &self.jwk.kid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use serde::Deserialize;

    const PRIVATE_PEM: &str = include_str!("../testdata/signing.key");
    const PUBLIC_PEM: &str = include_str!("../testdata/signing.pub");
    const PUBLIC_PKCS1_PEM: &str = include_str!("../testdata/signing_pkcs1.pub");
    const OTHER_PRIVATE_PEM: &str = include_str!("../testdata/other.key");

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    #[test]
    fn accepts_spki_and_pkcs1_public_keys() {
        let spki = SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM).expect("spki");
        let pkcs1 = SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PKCS1_PEM).expect("pkcs1");
        assert_eq!(spki.kid(), pkcs1.kid());
    }

    #[test]
    fn rejects_mismatched_pair() {
        let err = SigningKeys::from_pem(OTHER_PRIVATE_PEM, PUBLIC_PEM).expect_err("mismatch");
        assert_eq!(err.current_context(), &KeyError::Mismatch);
    }

    #[test]
    fn rejects_garbage() {
        let err = SigningKeys::from_pem("nope", PUBLIC_PEM).expect_err("bad private");
        assert!(matches!(
            err.current_context(),
            KeyError::InvalidPrivateKey { .. }
        ));

        let err = SigningKeys::from_pem(PRIVATE_PEM, "nope").expect_err("bad public");
        assert!(matches!(
            err.current_context(),
            KeyError::InvalidPublicKey { .. }
        ));
    }

    #[test]
    fn signed_token_verifies_against_published_jwk() {
        let keys = SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM).expect("keys");
        let claims = Claims {
            sub: "a@x.com".to_string(),
            exp: chrono::Utc::now().timestamp() + 60,
        };

        let token = keys.sign(&claims).expect("sign");

        let header = jsonwebtoken::decode_header(&token).expect("header");
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(keys.kid()));

        let jwk = keys.jwk();
        let decoding = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).expect("components");
        let decoded = jsonwebtoken::decode::<Claims>(&token, &decoding, &Validation::new(Algorithm::RS256))
            .expect("verify");
        assert_eq!(decoded.claims, claims);
    }

    #[test]
    fn debug_hides_key_material() {
        let keys = SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM).expect("keys");
        let debug = format!("{keys:?}");
        assert!(debug.contains(keys.kid()));
        assert!(!debug.contains("BEGIN"));
    }
}
