//! Argon2id key derivation and AES-256-GCM payload encryption.
//!
//! Key derivation: Argon2id(password, salt, header-stored costs) → 32-byte key
//! Encryption:     AES-256-GCM over the whole compressed payload, no AAD
//!
//! Sealed payload layout: [ ciphertext | GCM tag (16 B) ].  The nonce lives
//! in the archive header, not in front of the ciphertext.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::header::{KdfParams, NONCE_LEN, SALT_LEN};

/// AES-256 key length.
pub const KEY_LEN: usize = 32;
/// Byte length of the GCM authentication tag appended by `seal`.
pub const TAG_LEN: usize = 16;
/// Upper bound on the memory cost accepted from a header (4 GiB).
pub const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;

/// Derived key material.  Wiped from memory when dropped.
pub type Key = Zeroizing<[u8; KEY_LEN]>;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed: incorrect password or tampered archive")]
    DecryptionFailed,
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Derive a 256-bit key from `password` with Argon2id.
///
/// Deterministic in all inputs; the cost parameters come from the archive
/// header so that a later build with different defaults still reproduces it.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN], kdf: &KdfParams) -> Result<Key, CryptoError> {
    if kdf.memory_kib > MAX_MEMORY_KIB {
        return Err(CryptoError::KeyDerivation(format!(
            "memory cost {} KiB exceeds limit of {MAX_MEMORY_KIB} KiB",
            kdf.memory_kib
        )));
    }
    let params = Params::new(kdf.memory_kib, kdf.time_cost, u32::from(kdf.parallelism), Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

pub fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// One AEAD operation bound to a single (key, nonce) pair.
///
/// `seal` and `open` consume the cipher, so a nonce can never be used for
/// two encryptions through the same instance.
pub struct PayloadCipher {
    cipher: Aes256Gcm,
    nonce:  [u8; NONCE_LEN],
}

impl PayloadCipher {
    pub fn new(key: &Key, nonce: &[u8; NONCE_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key[..])),
            nonce:  *nonce,
        }
    }

    /// Returns `ciphertext || tag`.
    pub fn seal(self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.cipher
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Any tag mismatch, whatever its cause, is reported as `DecryptionFailed`.
    pub fn open(self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < TAG_LEN {
            return Err(CryptoError::DecryptionFailed);
        }
        self.cipher
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}
