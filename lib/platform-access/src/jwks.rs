//! JSON Web Key Set publication.
//!
//! RSA public keys are exported with unsigned big-endian modulus and
//! exponent, base64url without padding. The key id is the RFC 7638
//! thumbprint, so it is stable for a given key across restarts.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::RsaPublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single RSA signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub n: String,
    pub e: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_field: String,
    pub kid: String,
}

impl Jwk {
    /// Exports an RSA public key as an RS256 signing key.
    #[must_use]
    pub fn from_rsa(public: &RsaPublicKey) -> Self {
        let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());
        let kid = thumbprint(&n, &e);

        Self {
            kty: "RSA".to_string(),
            n,
            e,
            alg: "RS256".to_string(),
            use_field: "sig".to_string(),
            kid,
        }
    }
}

/// RFC 7638 thumbprint of an RSA key: SHA-256 over the required members in
/// lexicographic order with no whitespace.
fn thumbprint(n: &str, e: &str) -> String {
    let canonical = format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

/// A key set as served at the JWKS endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::DecodePublicKey;
    use rsa::BigUint;

    const PUBLIC_PEM: &str = include_str!("../testdata/signing.pub");
    const EXPECTED: &str = include_str!("../testdata/signing.jwk.json");

    fn expected(field: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(EXPECTED).expect("fixture");
        value[field].as_str().expect("string field").to_string()
    }

    #[test]
    fn known_key_reproduces_components() {
        let public = RsaPublicKey::from_public_key_pem(PUBLIC_PEM).expect("pem");
        let jwk = Jwk::from_rsa(&public);

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg, "RS256");
        assert_eq!(jwk.use_field, "sig");
        assert_eq!(jwk.n, expected("n"));
        assert_eq!(jwk.e, "AQAB");
        assert_eq!(jwk.e, expected("e"));
        assert_eq!(jwk.kid, expected("kid"));
    }

    #[test]
    fn kid_is_stable() {
        let public = RsaPublicKey::from_public_key_pem(PUBLIC_PEM).expect("pem");
        assert_eq!(Jwk::from_rsa(&public).kid, Jwk::from_rsa(&public).kid);
    }

    #[test]
    fn components_have_no_leading_zero() {
        let public = RsaPublicKey::from_public_key_pem(PUBLIC_PEM).expect("pem");
        let jwk = Jwk::from_rsa(&public);

        let n = URL_SAFE_NO_PAD.decode(&jwk.n).expect("n");
        assert_ne!(n[0], 0);
        assert_eq!(n.len(), 256);
        assert_eq!(&BigUint::from_bytes_be(&n), public.n());
    }

    #[test]
    fn serializes_use_member() {
        let public = RsaPublicKey::from_public_key_pem(PUBLIC_PEM).expect("pem");
        let jwks = Jwks {
            keys: vec![Jwk::from_rsa(&public)],
        };

        let json = serde_json::to_value(&jwks).expect("serialize");
        assert_eq!(json["keys"][0]["use"], "sig");
        assert!(json["keys"][0].get("use_field").is_none());
    }

    #[test]
    fn thumbprint_matches_rfc7638_example() {
        // RFC 7638 section 3.1.
        let n = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";
        assert_eq!(
            thumbprint(n, "AQAB"),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }
}
