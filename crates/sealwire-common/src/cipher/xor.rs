//! Single-byte XOR cipher.
//!
//! Not real cryptography; useful as a configuration-complete cipher for
//! tests and local development where key distribution is trivial.

use crate::error::{Result, SealwireError};

/// XOR cipher with a single-byte key. Encryption and decryption are the
/// same operation (involution).
pub struct XorCipher {
    key: u8,
}

impl XorCipher {
    /// Builds the cipher from `{"byte": N}` with `N` in 0..=255.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when `byte` is missing, not an integer, or
    /// out of range.
    pub fn new(params: &serde_json::Value) -> Result<Self> {
        let key = params
            .get("byte")
            .and_then(|v| v.as_u64())
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| {
                SealwireError::Configuration(
                    "XOR byte must be an integer between 0 and 255".to_string(),
                )
            })?;

        Ok(Self { key })
    }

    /// XORs every byte with the key. Applying twice restores the input.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter().map(|b| b ^ self.key).collect()
    }
}
