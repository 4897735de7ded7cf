use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::SecretError;
use crate::config::Config;

/// Encrypted secret value as stored at rest: both fields base64.
#[derive(Debug, Clone)]
pub struct SealedValue {
    pub ciphertext: String,
    pub nonce: String,
}

/// Local symmetric cipher for at-rest secrets: AES-256-GCM under a
/// process-wide 32-byte master key. Every encryption draws a fresh random
/// 12-byte nonce, so ciphertexts never repeat; the AEAD tag makes wrong-key
/// and tampered-ciphertext decryptions fail deterministically.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build from configuration. Dev mode falls back to a deterministic
    /// derived key when no master key is set.
    pub fn from_config(config: &Config) -> Result<Self, SecretError> {
        match (&config.master_key, config.dev_mode) {
            (Some(hex_key), _) => Ok(Self::new(parse_master_key(hex_key)?)),
            (None, true) => Ok(Self::new(dev_master_key())),
            (None, false) => Err(SecretError::Configuration(
                "SHIPSHAPE_MASTER_KEY is not set".into(),
            )),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<SealedValue, SecretError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| SecretError::Configuration(format!("failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; 12];
        rand::fill(&mut nonce_bytes[..]);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| SecretError::Configuration(format!("encryption failed: {e}")))?;

        Ok(SealedValue {
            ciphertext: BASE64.encode(ciphertext),
            nonce: BASE64.encode(nonce_bytes),
        })
    }

    pub fn decrypt(&self, ciphertext_b64: &str, nonce_b64: &str) -> Result<String, SecretError> {
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| SecretError::Decryption(format!("malformed ciphertext: {e}")))?;
        let nonce_bytes = BASE64
            .decode(nonce_b64)
            .map_err(|e| SecretError::Decryption(format!("malformed nonce: {e}")))?;
        if nonce_bytes.len() != 12 {
            return Err(SecretError::Decryption(format!(
                "nonce must be 12 bytes, got {}",
                nonce_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| SecretError::Configuration(format!("failed to create cipher: {e}")))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| {
                SecretError::Decryption("wrong key or corrupted ciphertext".into())
            })?;

        String::from_utf8(plaintext)
            .map_err(|e| SecretError::Decryption(format!("value is not valid UTF-8: {e}")))
    }
}

/// Parse a hex-encoded 32-byte master key (64 hex chars).
pub fn parse_master_key(hex_str: &str) -> Result<[u8; 32], SecretError> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| SecretError::Configuration(format!("invalid master key hex: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        SecretError::Configuration(format!("master key must be 32 bytes, got {}", v.len()))
    })
}

/// Derive a deterministic dev-mode key (NOT for production).
pub fn dev_master_key() -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"shipshape-dev-master-key-not-for-production");
    let result = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    key
}


#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip_any_string(s in ".*", key in proptest::array::uniform32(any::<u8>())) {
            let cipher = SecretCipher::new(key);
            let sealed = cipher.encrypt(&s).unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed.ciphertext, &sealed.nonce).unwrap(), s);
        }

        #[test]
        fn ciphertexts_never_repeat(s in ".{0,64}") {
            let cipher = SecretCipher::new([7u8; 32]);
            let a = cipher.encrypt(&s).unwrap();
            let b = cipher.encrypt(&s).unwrap();
            prop_assert_ne!(a.nonce, b.nonce);
        }
    }
}
