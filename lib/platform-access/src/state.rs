//! Authenticated encryption of OIDC state.
//!
//! State sent through the provider round trip is sealed with AES-256-GCM.
//! The output is `base64url(nonce ‖ ciphertext)` without padding. A wrong key
//! or any modified byte fails decryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{Rng, thread_rng};
use rootcause::Report;

use crate::error::StateError;

/// Required key length in bytes.
pub const STATE_KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

fn cipher(key: &[u8]) -> Result<Aes256Gcm, Report<StateError>> {
    if key.len() != STATE_KEY_LEN {
        return Err(StateError::InvalidKeyLength { len: key.len() }.into());
    }
    Ok(Aes256Gcm::new_from_slice(key)
        .map_err(|_| StateError::InvalidKeyLength { len: key.len() })?)
}

/// Encrypts `state` under a 32-byte key.
pub fn encrypt_state(state: &str, key: &[u8]) -> Result<String, Report<StateError>> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    thread_rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, state.as_bytes())
        .map_err(|_| StateError::Encrypt)?;

    let mut sealed = nonce_bytes.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// Decrypts a value produced by [`encrypt_state`].
pub fn decrypt_state(encrypted: &str, key: &[u8]) -> Result<String, Report<StateError>> {
    let cipher = cipher(key)?;

    let sealed = URL_SAFE_NO_PAD
        .decode(encrypted)
        .map_err(|_| StateError::Malformed)?;
    if sealed.len() <= NONCE_LEN {
        return Err(StateError::Malformed.into());
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| StateError::Decrypt)?;

    Ok(String::from_utf8(plaintext).map_err(|_| StateError::Decrypt)?)
}
