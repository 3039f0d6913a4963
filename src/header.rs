//! Fixed-layout archive headers.
//!
//! Every archive starts with the 4-byte magic `BTXZ` followed by a
//! little-endian `u16` format version.  The rest of the header depends on
//! the version:
//!
//! | Offset | v1                  | Size | v2                | Size |
//! |--------|---------------------|------|-------------------|------|
//! | 0      | magic               | 4    | magic             | 4    |
//! | 4      | version = 1         | 2    | version = 2       | 2    |
//! | 6      | protection mode     | 1    | compression level | 1    |
//! | 7      | names-encrypted     | 1    | -                 | -    |
//! | 8 / 7  | salt                | 16   | salt              | 16   |
//! |        | argon2 time cost    | 4    | argon2 time cost  | 4    |
//! |        | argon2 memory (KiB) | 4    | argon2 memory     | 4    |
//! |        | argon2 lanes        | 1    | argon2 lanes      | 1    |
//! |        | nonce               | 12   | nonce             | 12   |
//! | total  | 45                  |      | 44                |      |
//!
//! Fields are written one by one; no struct is ever transmuted to disk.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::codec::CompressionLevel;
use crate::crypto::{random_nonce, random_salt};

pub const MAGIC: &[u8; 4] = b"BTXZ";
/// Magic + version: the bytes the dispatcher peeks at.
pub const PREFIX_SIZE: usize = 6;
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;

pub const VERSION_V1: u16 = 1;
pub const VERSION_V2: u16 = 2;

pub const HEADER_V1_SIZE: usize = 45;
pub const HEADER_V2_SIZE: usize = 44;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Header truncated")]
    Truncated,
    #[error("Header version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u16, found: u16 },
    #[error("Invalid {field} byte {value:#04x}")]
    InvalidField { field: &'static str, value: u8 },
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for HeaderError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HeaderError::Truncated
        } else {
            HeaderError::Io(e)
        }
    }
}

// ── KDF cost parameters ─────────────────────────────────────────────────────

/// Argon2id cost parameters, persisted in the header so extraction always
/// reproduces the key regardless of what the current defaults are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub time_cost:   u32,
    /// Memory cost in KiB.
    pub memory_kib:  u32,
    pub parallelism: u8,
}

impl KdfParams {
    /// All-zero parameters stored by plaintext v1 archives.
    pub const NONE: KdfParams = KdfParams { time_cost: 0, memory_kib: 0, parallelism: 0 };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.time_cost)?;
        writer.write_u32::<LittleEndian>(self.memory_kib)?;
        writer.write_u8(self.parallelism)?;
        Ok(())
    }

    fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            time_cost:   reader.read_u32::<LittleEndian>()?,
            memory_kib:  reader.read_u32::<LittleEndian>()?,
            parallelism: reader.read_u8()?,
        })
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { time_cost: 1, memory_kib: 64 * 1024, parallelism: 4 }
    }
}

// ── Prefix ──────────────────────────────────────────────────────────────────

fn write_prefix<W: Write>(mut writer: W, version: u16) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_u16::<LittleEndian>(version)
}

/// Read the 6-byte prefix and return the format version.
///
/// Only the magic is validated; whether the version is known is the
/// dispatcher's decision.
pub fn peek_version<R: Read>(mut reader: R) -> Result<u16, HeaderError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(HeaderError::InvalidMagic);
    }
    Ok(reader.read_u16::<LittleEndian>()?)
}

fn expect_version<R: Read>(reader: R, expected: u16) -> Result<(), HeaderError> {
    let found = peek_version(reader)?;
    if found != expected {
        return Err(HeaderError::VersionMismatch { expected, found });
    }
    Ok(())
}

// ── v1 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtectionMode {
    Plaintext = 0x00,
    Encrypted = 0x01,
}

impl ProtectionMode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(ProtectionMode::Plaintext),
            0x01 => Some(ProtectionMode::Encrypted),
            _    => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderV1 {
    pub protection:      ProtectionMode,
    /// Legacy flag, always written equal to `protection`.  Readers keep the
    /// raw byte and never act on it.
    pub names_encrypted: u8,
    pub salt:            [u8; SALT_LEN],
    pub kdf:             KdfParams,
    pub nonce:           [u8; NONCE_LEN],
}

impl HeaderV1 {
    pub fn plaintext() -> Self {
        Self {
            protection:      ProtectionMode::Plaintext,
            names_encrypted: ProtectionMode::Plaintext as u8,
            salt:            [0u8; SALT_LEN],
            kdf:             KdfParams::NONE,
            nonce:           [0u8; NONCE_LEN],
        }
    }

    /// Fresh salt and nonce are drawn from the OS RNG on every call.
    pub fn encrypted(kdf: KdfParams) -> Self {
        Self {
            protection:      ProtectionMode::Encrypted,
            names_encrypted: ProtectionMode::Encrypted as u8,
            salt:            random_salt(),
            kdf,
            nonce:           random_nonce(),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.protection == ProtectionMode::Encrypted
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write_prefix(&mut writer, VERSION_V1)?;
        writer.write_u8(self.protection as u8)?;
        writer.write_u8(self.names_encrypted)?;
        writer.write_all(&self.salt)?;
        self.kdf.write(&mut writer)?;
        writer.write_all(&self.nonce)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        expect_version(&mut reader, VERSION_V1)?;
        let mode = reader.read_u8()?;
        let protection = ProtectionMode::from_byte(mode)
            .ok_or(HeaderError::InvalidField { field: "protection mode", value: mode })?;
        let names_encrypted = reader.read_u8()?;
        let mut salt = [0u8; SALT_LEN];
        reader.read_exact(&mut salt)?;
        let kdf = KdfParams::read(&mut reader)?;
        let mut nonce = [0u8; NONCE_LEN];
        reader.read_exact(&mut nonce)?;
        Ok(Self { protection, names_encrypted, salt, kdf, nonce })
    }
}

// ── v2 ──────────────────────────────────────────────────────────────────────

/// v2 has no plaintext mode: the KDF fields are always populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderV2 {
    pub level: CompressionLevel,
    pub salt:  [u8; SALT_LEN],
    pub kdf:   KdfParams,
    pub nonce: [u8; NONCE_LEN],
}

impl HeaderV2 {
    pub fn new(level: CompressionLevel, kdf: KdfParams) -> Self {
        Self { level, salt: random_salt(), kdf, nonce: random_nonce() }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write_prefix(&mut writer, VERSION_V2)?;
        writer.write_u8(self.level.code())?;
        writer.write_all(&self.salt)?;
        self.kdf.write(&mut writer)?;
        writer.write_all(&self.nonce)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        expect_version(&mut reader, VERSION_V2)?;
        let code = reader.read_u8()?;
        let level = CompressionLevel::from_code(code)
            .ok_or(HeaderError::InvalidField { field: "compression level", value: code })?;
        let mut salt = [0u8; SALT_LEN];
        reader.read_exact(&mut salt)?;
        let kdf = KdfParams::read(&mut reader)?;
        let mut nonce = [0u8; NONCE_LEN];
        reader.read_exact(&mut nonce)?;
        Ok(Self { level, salt, kdf, nonce })
    }
}

// ── Any version ─────────────────────────────────────────────────────────────

/// A decoded header of any version this build understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    V1(HeaderV1),
    V2(HeaderV2),
}

impl Header {
    pub fn version(&self) -> u16 {
        match self {
            Header::V1(_) => VERSION_V1,
            Header::V2(_) => VERSION_V2,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Header::V1(_) => HEADER_V1_SIZE,
            Header::V2(_) => HEADER_V2_SIZE,
        }
    }

    pub fn kdf(&self) -> &KdfParams {
        match self {
            Header::V1(h) => &h.kdf,
            Header::V2(h) => &h.kdf,
        }
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        match self {
            Header::V1(h) => &h.salt,
            Header::V2(h) => &h.salt,
        }
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        match self {
            Header::V1(h) => &h.nonce,
            Header::V2(h) => &h.nonce,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        match self {
            Header::V1(h) => h.is_encrypted(),
            Header::V2(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_v1(h: &HeaderV1) -> Vec<u8> {
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        buf
    }

    fn encode_v2(h: &HeaderV2) -> Vec<u8> {
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn v1_layout_is_pinned() {
        let mut h = HeaderV1::encrypted(KdfParams { time_cost: 2, memory_kib: 0x0001_0000, parallelism: 4 });
        h.salt = [0xAA; SALT_LEN];
        h.nonce = [0xBB; NONCE_LEN];
        let buf = encode_v1(&h);

        assert_eq!(buf.len(), HEADER_V1_SIZE);
        assert_eq!(&buf[0..4], b"BTXZ");
        assert_eq!(&buf[4..6], &[1, 0]);
        assert_eq!(buf[6], 1);
        assert_eq!(buf[7], 1);
        assert_eq!(&buf[8..24], &[0xAA; 16]);
        assert_eq!(&buf[24..28], &[2, 0, 0, 0]);
        assert_eq!(&buf[28..32], &[0, 0, 1, 0]);
        assert_eq!(buf[32], 4);
        assert_eq!(&buf[33..45], &[0xBB; 12]);
    }

    #[test]
    fn v2_layout_is_pinned() {
        let mut h = HeaderV2::new(CompressionLevel::Best, KdfParams::default());
        h.salt = [0x11; SALT_LEN];
        h.nonce = [0x22; NONCE_LEN];
        let buf = encode_v2(&h);

        assert_eq!(buf.len(), HEADER_V2_SIZE);
        assert_eq!(&buf[0..4], b"BTXZ");
        assert_eq!(&buf[4..6], &[2, 0]);
        assert_eq!(buf[6], 3);
        assert_eq!(&buf[7..23], &[0x11; 16]);
        assert_eq!(&buf[23..27], &[1, 0, 0, 0]);
        assert_eq!(&buf[27..31], &(64u32 * 1024).to_le_bytes());
        assert_eq!(buf[31], 4);
        assert_eq!(&buf[32..44], &[0x22; 12]);
    }

    #[test]
    fn plaintext_v1_zeroes_crypto_fields() {
        let buf = encode_v1(&HeaderV1::plaintext());
        assert_eq!(buf[6], 0);
        assert_eq!(buf[7], 0);
        assert!(buf[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn fresh_headers_never_share_salt_or_nonce() {
        let a = HeaderV2::new(CompressionLevel::Default, KdfParams::default());
        let b = HeaderV2::new(CompressionLevel::Default, KdfParams::default());
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn peek_rejects_bad_magic() {
        let err = peek_version(&b"PK\x03\x04\x01\x00"[..]).unwrap_err();
        assert!(matches!(err, HeaderError::InvalidMagic));
    }

    #[test]
    fn peek_reports_truncation() {
        let err = peek_version(&b"BTX"[..]).unwrap_err();
        assert!(matches!(err, HeaderError::Truncated));
    }

    #[test]
    fn reading_wrong_version_fails() {
        let buf = encode_v2(&HeaderV2::new(CompressionLevel::Fastest, KdfParams::default()));
        let err = HeaderV1::read(&buf[..]).unwrap_err();
        assert!(matches!(err, HeaderError::VersionMismatch { expected: 1, found: 2 }));
    }

    #[test]
    fn unknown_protection_mode_is_rejected() {
        let mut buf = encode_v1(&HeaderV1::plaintext());
        buf[6] = 7;
        let err = HeaderV1::read(&buf[..]).unwrap_err();
        assert!(matches!(err, HeaderError::InvalidField { value: 7, .. }));
    }

    proptest! {
        #[test]
        fn v2_decode_inverts_encode(
            code in 1u8..=3,
            salt in any::<[u8; 16]>(),
            nonce in any::<[u8; 12]>(),
            time_cost in any::<u32>(),
            memory_kib in any::<u32>(),
            parallelism in any::<u8>(),
        ) {
            let h = HeaderV2 {
                level: CompressionLevel::from_code(code).unwrap(),
                salt,
                kdf: KdfParams { time_cost, memory_kib, parallelism },
                nonce,
            };
            let buf = encode_v2(&h);
            prop_assert_eq!(buf.len(), HEADER_V2_SIZE);
            prop_assert_eq!(HeaderV2::read(&buf[..]).unwrap(), h);
        }
    }
}
