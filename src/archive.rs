//! High-level API and format dispatcher.  This is the primary embedding surface.
//!
//! ```no_run
//! use btxz::archive::{create_archive, extract_archive, list_archive_contents};
//! use btxz::CompressionLevel;
//!
//! // Write (always the newest format)
//! create_archive("out.btxz", &["./docs", "./notes.txt"], "s3cr3t!", CompressionLevel::Default)?;
//!
//! // Read (any version this build knows)
//! for entry in list_archive_contents("out.btxz", "s3cr3t!")? {
//!     println!("{} {:>10} {}", entry.mode_string(), entry.size, entry.name);
//! }
//! let report = extract_archive("out.btxz", "restored", "s3cr3t!")?;
//! assert!(report.skipped.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use log::debug;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::codec::CompressionLevel;
use crate::error::{ArchiveError, ExtractFailure, Result};
use crate::format::FormatVersion;
use crate::header::{peek_version, Header, HeaderV1, HeaderV2, KdfParams};

// ── CreateOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`create_archive_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    pub level: CompressionLevel,
    /// Stored in the header; extraction always uses the stored values.
    pub kdf:   KdfParams,
}

// ── ArchiveEntry ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Links and special files written by other tools.  Listed, never extracted.
    Other,
}

/// Metadata of one entry, as returned by [`list_archive_contents`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Permission bits (`0o7777` mask).
    pub mode: u32,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    /// `ls`-style rendering, e.g. `-rw-r--r--` or `drwxr-xr-x`.
    pub fn mode_string(&self) -> String {
        let mut out = String::with_capacity(10);
        out.push(match self.kind {
            EntryKind::File      => '-',
            EntryKind::Directory => 'd',
            EntryKind::Other     => '?',
        });
        for shift in [6u32, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        out
    }
}

// ── ExtractReport ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Entries written to disk, in container order.
    pub extracted: Vec<String>,
    /// Entries refused by the safety guard, by their in-archive name.
    pub skipped:   Vec<String>,
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Read the 6-byte prefix of `path` and map it to a known format version.
/// The file is closed before returning.
pub fn detect_version<P: AsRef<Path>>(path: P) -> Result<FormatVersion> {
    let mut file = File::open(path.as_ref())?;
    let version = peek_version(&mut file)?;
    FormatVersion::from_u16(version).ok_or(ArchiveError::UnsupportedVersion(version))
}

/// Decode the full header of any supported version without reading the
/// payload.  Needs no password.
pub fn inspect_header<P: AsRef<Path>>(path: P) -> Result<Header> {
    let path = path.as_ref();
    let version = detect_version(path)?;
    let mut reader = BufReader::new(File::open(path)?);
    Ok(match version {
        FormatVersion::V1 => Header::V1(HeaderV1::read(&mut reader)?),
        FormatVersion::V2 => Header::V2(HeaderV2::read(&mut reader)?),
    })
}

/// Create an archive in the newest format with default KDF costs.
pub fn create_archive<P, Q>(dest: P, inputs: &[Q], password: &str, level: CompressionLevel) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let opts = CreateOptions { level, ..CreateOptions::default() };
    create_archive_with(dest, inputs, password, &opts)
}

/// Create an archive in the newest format.  There is deliberately no way
/// to pick an older version here.
pub fn create_archive_with<P, Q>(dest: P, inputs: &[Q], password: &str, opts: &CreateOptions) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let inputs: Vec<PathBuf> = inputs.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let codec = FormatVersion::LATEST.codec();
    debug!("creating {} archive {}", codec.version(), dest.as_ref().display());
    codec.build(dest.as_ref(), &inputs, password, opts)
}

/// Extract every safe entry of `archive` into `out_dir`.
///
/// Unsafe entry names are skipped and reported in the result; only an
/// unreadable or undecryptable archive is an error.
pub fn extract_archive<P, Q>(archive: P, out_dir: Q, password: &str)
    -> std::result::Result<ExtractReport, ExtractFailure>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let archive = archive.as_ref();
    let version = detect_version(archive)?;
    debug!("extracting {} archive {}", version, archive.display());
    version.codec().extract(archive, out_dir.as_ref(), password)
}

pub fn list_archive_contents<P: AsRef<Path>>(archive: P, password: &str) -> Result<Vec<ArchiveEntry>> {
    let archive = archive.as_ref();
    let version = detect_version(archive)?;
    debug!("listing {} archive {}", version, archive.display());
    version.codec().list(archive, password)
}
