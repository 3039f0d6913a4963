use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;
use crate::header::HeaderError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Missing or wrong magic, or a malformed header.
    #[error("Not a valid BTXZ archive: {0}")]
    InvalidFormat(String),

    #[error("Unsupported archive format version: v{0}")]
    UnsupportedVersion(u16),

    #[error("A password is required for this archive")]
    PasswordRequired,

    /// Wrong password and tampered ciphertext are deliberately the same error.
    #[error("Decryption failed: incorrect password or tampered archive")]
    DecryptionFailed,

    #[error("No input files or folders specified")]
    NoInputs,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression or container parsing failed after decryption succeeded.
    #[error("Corrupt archive payload: {0}")]
    CorruptPayload(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<HeaderError> for ArchiveError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::Io(e) => ArchiveError::Io(e),
            other => ArchiveError::InvalidFormat(other.to_string()),
        }
    }
}

impl From<CryptoError> for ArchiveError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::DecryptionFailed => ArchiveError::DecryptionFailed,
            CryptoError::KeyDerivation(msg) => ArchiveError::KeyDerivation(msg),
            CryptoError::EncryptionFailed => ArchiveError::Compression("payload encryption failed".into()),
        }
    }
}

impl From<CodecError> for ArchiveError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Compression(msg) => ArchiveError::Compression(msg),
            CodecError::Decompression(msg) => ArchiveError::CorruptPayload(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// A fatal extraction error together with the entries already skipped as
/// unsafe before it happened.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct ExtractFailure {
    pub skipped: Vec<String>,
    #[source]
    pub source:  ArchiveError,
}

impl ExtractFailure {
    pub fn kind(&self) -> &ArchiveError {
        &self.source
    }
}

impl From<ArchiveError> for ExtractFailure {
    fn from(source: ArchiveError) -> Self {
        Self { skipped: Vec::new(), source }
    }
}
