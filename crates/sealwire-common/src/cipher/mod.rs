//! Pluggable symmetric ciphers.
//!
//! Every frame on the wire is encrypted with exactly one cipher, fixed per
//! channel and selected at construction time by the configuration tag. The
//! registry is a closed set of variants rather than a dynamic plugin loader:
//! adding a cipher means adding a variant here.
//!
//! # Supported Ciphers
//!
//! | tag       | parameters                                  |
//! |-----------|---------------------------------------------|
//! | `xor`     | `byte` (integer 0-255)                      |
//! | `aes-cbc` | `key` (base64, 16/24/32 bytes), `iv` (base64, 16 bytes) |
//! | `aes-gcm` | `key` (base64, 16/24/32 bytes), `nonce` (base64, 12 bytes) |
//!
//! # Security Note
//!
//! The AES IV/nonce is fixed per channel, supplied out-of-band via
//! configuration, and reused for every message on that channel. Reusing a
//! nonce across many messages weakens the CBC/GCM guarantees; both peers
//! must treat a channel as a single short-lived session.

pub mod aes;
pub mod xor;

pub use aes::{AesCbcCipher, AesGcmCipher};
pub use xor::XorCipher;

use crate::config::CipherConfig;
use crate::error::{Result, SealwireError};

/// A configured symmetric cipher.
///
/// Encryption and decryption are symmetric per channel: both peers must be
/// configured with the same tag and parameters, since cipher identity is
/// never carried on the wire.
pub enum Cipher {
    Xor(XorCipher),
    AesCbc(AesCbcCipher),
    AesGcm(AesGcmCipher),
}

impl Cipher {
    /// Builds a cipher from its configuration tag and parameters.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unknown tag or for missing, malformed
    /// (bad base64), or wrong-length parameters.
    pub fn from_config(config: &CipherConfig) -> Result<Self> {
        let cipher = match config.kind.as_str() {
            "xor" => Cipher::Xor(XorCipher::new(&config.params)?),
            "aes-cbc" => Cipher::AesCbc(AesCbcCipher::new(&config.params)?),
            "aes-gcm" => Cipher::AesGcm(AesGcmCipher::new(&config.params)?),
            other => {
                return Err(SealwireError::Configuration(format!(
                    "unsupported cipher type: {}",
                    other
                )))
            }
        };

        tracing::debug!(kind = %config.kind, "initialized cipher");
        Ok(cipher)
    }

    /// Encrypts a plaintext into a ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Cipher::Xor(c) => Ok(c.apply(plaintext)),
            Cipher::AesCbc(c) => c.encrypt(plaintext),
            Cipher::AesGcm(c) => c.encrypt(plaintext),
        }
    }

    /// Decrypts a ciphertext back into the plaintext.
    ///
    /// # Errors
    ///
    /// Returns `Crypto` on padding inconsistencies (CBC) or authentication
    /// failure (GCM). Such failures mean a hostile or corrupted peer; the
    /// caller closes the connection.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Cipher::Xor(c) => Ok(c.apply(ciphertext)),
            Cipher::AesCbc(c) => c.decrypt(ciphertext),
            Cipher::AesGcm(c) => c.decrypt(ciphertext),
        }
    }
}
