//! Whole-payload stream compressors.
//!
//! Each archive version pins exactly one codec: v1 compresses its tar stream
//! with xz (LZMA2), v2 compresses its zip container with Zstandard.  The
//! codec is implied by the version field, so no codec id is ever written to
//! disk.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use thiserror::Error;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

// ── CompressionLevel ────────────────────────────────────────────────────────

/// Speed/ratio tier chosen at creation time.  The discriminant is the byte
/// stored in the v2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CompressionLevel {
    Fastest = 0x01,
    #[default]
    Default = 0x02,
    Best    = 0x03,
}

impl CompressionLevel {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(CompressionLevel::Fastest),
            0x02 => Some(CompressionLevel::Default),
            0x03 => Some(CompressionLevel::Best),
            _    => None,
        }
    }

    /// Zstandard level used for this tier.
    pub fn zstd_level(self) -> i32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Default => 3,
            CompressionLevel::Best    => 19,
        }
    }

    /// xz preset used for this tier.  v1 archives are always built at
    /// `Default`, i.e. preset 6.
    pub fn xz_preset(self) -> u32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best    => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionLevel::Fastest => "fast",
            CompressionLevel::Default => "default",
            CompressionLevel::Best    => "best",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" | "fastest" => Ok(CompressionLevel::Fastest),
            "default"          => Ok(CompressionLevel::Default),
            "best"             => Ok(CompressionLevel::Best),
            other => Err(format!("invalid level '{other}': must be one of fast, default, best")),
        }
    }
}

// ── Error type ──────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
}

// ── Codec trait ─────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// xz container around LZMA2.
pub struct XzCodec;

impl XzCodec {
    /// Streaming decoder over `input`, e.g. the file handle positioned
    /// after a plaintext header.  Nothing is buffered beyond liblzma's
    /// own window.
    pub fn decoder<R: Read>(&self, input: R) -> XzDecoder<R> {
        XzDecoder::new(input)
    }
}

impl Codec for XzCodec {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>, CodecError> {
        let mut encoder = XzEncoder::new(Vec::with_capacity(data.len() / 4), level.xz_preset());
        encoder.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        encoder.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.decoder(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, level.zstd_level()).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_codes_match_header_values() {
        assert_eq!(CompressionLevel::Fastest.code(), 1);
        assert_eq!(CompressionLevel::Default.code(), 2);
        assert_eq!(CompressionLevel::Best.code(), 3);
        assert_eq!(CompressionLevel::from_code(0), None);
        assert_eq!(CompressionLevel::from_code(4), None);
    }

    #[test]
    fn level_parses_cli_names() {
        assert_eq!("fast".parse::<CompressionLevel>(), Ok(CompressionLevel::Fastest));
        assert_eq!("DEFAULT".parse::<CompressionLevel>(), Ok(CompressionLevel::Default));
        assert_eq!("best".parse::<CompressionLevel>(), Ok(CompressionLevel::Best));
        assert!("ultra".parse::<CompressionLevel>().is_err());
    }

    #[test]
    fn every_codec_restores_input() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(64);
        let codecs: [(&str, &dyn Codec); 2] = [("xz", &XzCodec), ("zstd", &ZstdCodec)];
        for (name, codec) in codecs {
            let packed = codec.compress(&data, CompressionLevel::Best).unwrap();
            assert_eq!(codec.decompress(&packed).unwrap(), data, "{name}");
        }
    }

    #[test]
    fn repetitive_input_compresses_well() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(20_000);
        let codecs: [(&str, &dyn Codec); 2] = [("xz", &XzCodec), ("zstd", &ZstdCodec)];
        for (name, codec) in codecs {
            let packed = codec.compress(&data, CompressionLevel::Default).unwrap();
            assert!(packed.len() * 100 < data.len(), "{name}: {} -> {}", data.len(), packed.len());
        }
    }

    #[test]
    fn xz_decoder_streams_in_small_reads() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 97) as u8).collect();
        let packed = XzCodec.compress(&data, CompressionLevel::Fastest).unwrap();

        let mut decoder = XzCodec.decoder(packed.as_slice());
        let mut out = Vec::new();
        let mut chunk = [0u8; 333];
        loop {
            let n = decoder.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn garbage_fails_to_decompress() {
        let codecs: [&dyn Codec; 2] = [&XzCodec, &ZstdCodec];
        for codec in codecs {
            let err = codec.decompress(b"definitely not compressed").unwrap_err();
            assert!(matches!(err, CodecError::Decompression(_)));
        }
    }
}
