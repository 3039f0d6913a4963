//! Version-specific archive codecs.
//!
//! Every on-disk format version is one variant of [`FormatVersion`] with one
//! [`FormatCodec`] implementation behind it.  Supporting a new version means
//! adding a variant and a module; existing variants are never changed, so
//! archives written by older builds stay readable.

pub mod v1;
pub mod v2;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveEntry, CreateOptions, ExtractReport};
use crate::error::{ArchiveError, ExtractFailure, Result};
use crate::guard::ExtractionGuard;
use crate::header::{VERSION_V1, VERSION_V2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    V1,
    V2,
}

impl FormatVersion {
    /// The version every new archive is written in.
    pub const LATEST: FormatVersion = FormatVersion::V2;

    pub fn from_u16(version: u16) -> Option<Self> {
        match version {
            VERSION_V1 => Some(FormatVersion::V1),
            VERSION_V2 => Some(FormatVersion::V2),
            _          => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            FormatVersion::V1 => VERSION_V1,
            FormatVersion::V2 => VERSION_V2,
        }
    }

    pub fn codec(self) -> &'static dyn FormatCodec {
        match self {
            FormatVersion::V1 => &v1::V1Format,
            FormatVersion::V2 => &v2::V2Format,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u16())
    }
}

/// Uniform capability interface implemented once per format version.
pub trait FormatCodec: Sync {
    fn version(&self) -> FormatVersion;

    /// Write a complete archive to `dest`.
    fn build(&self, dest: &Path, inputs: &[PathBuf], password: &str, opts: &CreateOptions) -> Result<()>;

    /// Restore every safe entry under `out_dir`.
    fn extract(&self, archive: &Path, out_dir: &Path, password: &str)
        -> std::result::Result<ExtractReport, ExtractFailure>;

    /// Entry metadata in container order.  Never writes to the filesystem.
    fn list(&self, archive: &Path, password: &str) -> Result<Vec<ArchiveEntry>>;
}

// ── Shared helpers ───────────────────────────────────────────────────────────

pub(crate) fn corrupt<E: fmt::Display>(e: E) -> ArchiveError {
    ArchiveError::CorruptPayload(e.to_string())
}

/// Run an entry loop against a fresh guard and fold the outcome into the
/// extraction result, carrying skipped names on both paths.
pub(crate) fn run_extraction<F>(out_dir: &Path, unpack: F) -> std::result::Result<ExtractReport, ExtractFailure>
where
    F: FnOnce(&mut ExtractionGuard, &mut Vec<String>) -> Result<()>,
{
    let mut guard = ExtractionGuard::new(out_dir).map_err(ArchiveError::from)?;
    let mut extracted = Vec::new();
    match unpack(&mut guard, &mut extracted) {
        Ok(()) => Ok(ExtractReport { extracted, skipped: guard.into_skipped() }),
        Err(source) => Err(ExtractFailure { skipped: guard.into_skipped(), source }),
    }
}

/// Write one regular file, creating parent directories as needed, and
/// apply its permission bits.
pub(crate) fn restore_file<R: Read + ?Sized>(target: &Path, mode: u32, contents: &mut R) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(target)?;
    io::copy(contents, &mut out)?;
    drop(out);
    set_mode(target, mode & 0o777)
}

/// Directories stay owner-writable so their children can still be written.
pub(crate) fn restore_dir(target: &Path, mode: u32) -> io::Result<()> {
    fs::create_dir_all(target)?;
    set_mode(target, (mode & 0o777) | 0o700)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms)
}
