//! Credential encryption at rest
//!
//! AES-256-GCM with a random 12-byte nonce prepended to the ciphertext,
//! transported as base64. The key is derived from the configured catalog
//! secret with SHA-256, so operators only manage one passphrase.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Nonce length for AES-GCM
const NONCE_LEN: usize = 12;

/// Symmetric cipher for provider credentials
#[derive(Clone)]
pub struct KeyCipher {
    key: [u8; 32],
}

impl KeyCipher {
    /// Derive the encryption key from an operator-supplied secret
    pub fn derive(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt a plaintext credential to a base64 token
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::Encrypt)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend(ciphertext);

        Ok(BASE64.encode(blob))
    }

    /// Decrypt a base64 token back to the plaintext credential
    pub fn decrypt(&self, token: &str) -> Result<String, CryptoError> {
        let blob = BASE64.decode(token).map_err(|_| CryptoError::Malformed)?;
        if blob.len() < NONCE_LEN {
            return Err(CryptoError::Malformed);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::Decrypt)?;
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cipher = KeyCipher::derive("test-secret");
        let token = cipher.encrypt("sk-1234567890abcdef").unwrap();
        assert_ne!(token, "sk-1234567890abcdef");
        assert_eq!(cipher.decrypt(&token).unwrap(), "sk-1234567890abcdef");
    }

    #[test]
    fn nonce_makes_tokens_distinct() {
        let cipher = KeyCipher::derive("test-secret");
        let a = cipher.encrypt("same-key").unwrap();
        let b = cipher.encrypt("same-key").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let token = KeyCipher::derive("secret-a").encrypt("sk-key").unwrap();
        let err = KeyCipher::derive("secret-b").decrypt(&token).unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt));
    }

    #[test]
    fn garbage_is_malformed() {
        let cipher = KeyCipher::derive("secret");
        assert!(matches!(cipher.decrypt("not base64!!"), Err(CryptoError::Malformed)));
        assert!(matches!(cipher.decrypt("AAAA"), Err(CryptoError::Malformed)));
    }
}
