pub mod cipher;
pub mod store;

pub use cipher::SecretCipher;
pub use store::{SecretStore, SecretSummary};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// Absent or malformed master key, or a cipher that cannot be built.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed ciphertext/nonce, or a key change since encryption.
    #[error("decryption error: {0}")]
    Decryption(String),
}
