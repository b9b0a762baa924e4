//! AES cipher variants: CBC with PKCS#7 padding, and GCM (AEAD).
//!
//! Key, IV, and nonce material arrives base64-encoded from configuration
//! and is fixed for the lifetime of the channel. Accepted key lengths are
//! 16, 24, and 32 bytes (AES-128/192/256); the CBC IV is 16 bytes, the GCM
//! nonce 12 bytes.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::AesGcm;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, SealwireError};

/// AES block size in bytes; also the CBC IV length.
const BLOCK_SIZE: usize = 16;

/// GCM nonce length in bytes.
const NONCE_SIZE: usize = 12;

/// GCM authentication tag length in bytes (appended to the ciphertext).
const TAG_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

type Aes128Gcm = aes_gcm::Aes128Gcm;
type Aes192Gcm = AesGcm<Aes192, U12>;
type Aes256Gcm = aes_gcm::Aes256Gcm;

/// Decodes a required base64 parameter.
fn base64_param(params: &serde_json::Value, name: &str) -> Result<Vec<u8>> {
    let encoded = params.get(name).and_then(|v| v.as_str()).ok_or_else(|| {
        SealwireError::Configuration(format!("missing cipher parameter: {}", name))
    })?;

    STANDARD.decode(encoded).map_err(|_| {
        SealwireError::Configuration(format!("cipher parameter {} must be valid base64", name))
    })
}

fn validate_key_length(key: &[u8]) -> Result<()> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        other => Err(SealwireError::Configuration(format!(
            "AES key must be 16, 24, or 32 bytes, got {}",
            other
        ))),
    }
}

/// AES in CBC mode with PKCS#7-style padding.
///
/// Padding is handled here rather than by the block-mode layer: encryption
/// always appends 1..=16 bytes (a full extra block when the plaintext is
/// already aligned), and decryption strips the count read from the final
/// byte, rejecting counts outside that range.
pub struct AesCbcCipher {
    key: Vec<u8>,
    iv: [u8; BLOCK_SIZE],
}

impl AesCbcCipher {
    /// Builds the cipher from `{"key": <base64>, "iv": <base64>}`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for missing parameters, bad base64, a key
    /// outside {16, 24, 32} bytes, or an IV that is not 16 bytes.
    pub fn new(params: &serde_json::Value) -> Result<Self> {
        let key = base64_param(params, "key")?;
        let iv = base64_param(params, "iv")?;

        validate_key_length(&key)?;
        let iv: [u8; BLOCK_SIZE] = iv.try_into().map_err(|iv: Vec<u8>| {
            SealwireError::Configuration(format!("AES-CBC IV must be 16 bytes, got {}", iv.len()))
        })?;

        Ok(Self { key, iv })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        // PKCS#7: always pad, even when already block-aligned.
        let pad_len = BLOCK_SIZE - (plaintext.len() % BLOCK_SIZE);
        let mut padded = Vec::with_capacity(plaintext.len() + pad_len);
        padded.extend_from_slice(plaintext);
        padded.resize(plaintext.len() + pad_len, pad_len as u8);

        let ciphertext = match self.key.len() {
            16 => Aes128CbcEnc::new_from_slices(&self.key, &self.iv)
                .map_err(key_error)?
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
            24 => Aes192CbcEnc::new_from_slices(&self.key, &self.iv)
                .map_err(key_error)?
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
            32 => Aes256CbcEnc::new_from_slices(&self.key, &self.iv)
                .map_err(key_error)?
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
            _ => unreachable!("key length validated at construction"),
        };

        Ok(ciphertext)
    }

    /// # Errors
    ///
    /// Returns `Crypto` when the ciphertext is not a whole number of blocks
    /// or the final padding byte is inconsistent (outside 1..=16, or larger
    /// than the decrypted buffer).
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(SealwireError::Crypto(format!(
                "AES-CBC ciphertext length {} is not a multiple of the block size",
                ciphertext.len()
            )));
        }

        let padded = match self.key.len() {
            16 => Aes128CbcDec::new_from_slices(&self.key, &self.iv)
                .map_err(key_error)?
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            24 => Aes192CbcDec::new_from_slices(&self.key, &self.iv)
                .map_err(key_error)?
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            32 => Aes256CbcDec::new_from_slices(&self.key, &self.iv)
                .map_err(key_error)?
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            _ => unreachable!("key length validated at construction"),
        }
        .map_err(|_| SealwireError::Crypto("AES-CBC decryption failed".to_string()))?;

        let pad_len = *padded.last().expect("buffer is at least one block") as usize;
        if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > padded.len() {
            return Err(SealwireError::Crypto(format!(
                "invalid PKCS#7 padding byte: {}",
                pad_len
            )));
        }

        Ok(padded[..padded.len() - pad_len].to_vec())
    }
}

/// AES in GCM mode (authenticated encryption).
///
/// Ciphertext layout on the wire is `ciphertext || 16-byte tag`; decryption
/// verifies the tag and fails rather than ever returning unauthenticated
/// plaintext.
pub struct AesGcmCipher {
    key: Vec<u8>,
    nonce: [u8; NONCE_SIZE],
}

impl AesGcmCipher {
    /// Builds the cipher from `{"key": <base64>, "nonce": <base64>}`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for missing parameters, bad base64, a key
    /// outside {16, 24, 32} bytes, or a nonce that is not 12 bytes.
    pub fn new(params: &serde_json::Value) -> Result<Self> {
        let key = base64_param(params, "key")?;
        let nonce = base64_param(params, "nonce")?;

        validate_key_length(&key)?;
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|nonce: Vec<u8>| {
            SealwireError::Configuration(format!(
                "AES-GCM nonce must be 12 bytes, got {}",
                nonce.len()
            ))
        })?;

        Ok(Self { key, nonce })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = aes_gcm::Nonce::from_slice(&self.nonce);
        let result = match self.key.len() {
            16 => Aes128Gcm::new_from_slice(&self.key)
                .map_err(key_error)?
                .encrypt(nonce, plaintext),
            24 => Aes192Gcm::new_from_slice(&self.key)
                .map_err(key_error)?
                .encrypt(nonce, plaintext),
            32 => Aes256Gcm::new_from_slice(&self.key)
                .map_err(key_error)?
                .encrypt(nonce, plaintext),
            _ => unreachable!("key length validated at construction"),
        };

        result.map_err(|_| SealwireError::Crypto("AES-GCM encryption failed".to_string()))
    }

    /// # Errors
    ///
    /// Returns `Crypto` when the input is shorter than the 16-byte tag or
    /// when tag verification fails (tampered or foreign ciphertext).
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(SealwireError::Crypto(format!(
                "AES-GCM ciphertext too short: {} bytes",
                ciphertext.len()
            )));
        }

        let nonce = aes_gcm::Nonce::from_slice(&self.nonce);
        let result = match self.key.len() {
            16 => Aes128Gcm::new_from_slice(&self.key)
                .map_err(key_error)?
                .decrypt(nonce, ciphertext),
            24 => Aes192Gcm::new_from_slice(&self.key)
                .map_err(key_error)?
                .decrypt(nonce, ciphertext),
            32 => Aes256Gcm::new_from_slice(&self.key)
                .map_err(key_error)?
                .decrypt(nonce, ciphertext),
            _ => unreachable!("key length validated at construction"),
        };

        result.map_err(|_| {
            SealwireError::Crypto("AES-GCM authentication failed".to_string())
        })
    }
}

fn key_error<E: std::fmt::Debug>(e: E) -> SealwireError {
    SealwireError::Crypto(format!("cipher key setup failed: {:?}", e))
}
