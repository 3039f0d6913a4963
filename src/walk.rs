//! Input collection shared by every archive builder.
//!
//! Each input path is walked in file-name order.  A directory input is its
//! own base, so its children are stored relative to it; a file input is
//! stored under its bare file name.  Only regular files become entries:
//! directories are implied by file paths and empty ones are not kept.

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// One regular file scheduled for packing.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Location on disk.
    pub source: PathBuf,
    /// Portable in-archive name, `/`-separated.
    pub name:   String,
    /// Permission bits (`0o7777` mask).
    pub mode:   u32,
    /// Modification time, seconds since the Unix epoch.
    pub mtime:  u64,
}

pub fn collect_inputs(inputs: &[PathBuf]) -> io::Result<Vec<InputFile>> {
    let mut files = Vec::new();
    for input in inputs {
        let meta = fs::metadata(input)?;
        let base = if meta.is_dir() {
            input.clone()
        } else {
            input.parent().map(Path::to_path_buf).unwrap_or_default()
        };

        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                warn!("skipping non-regular file {}", entry.path().display());
                continue;
            }
            let meta = entry.metadata().map_err(io::Error::from)?;
            let name = archive_name(entry.path(), &base)?;
            files.push(InputFile {
                source: entry.path().to_path_buf(),
                name,
                mode: permission_bits(&meta),
                mtime: meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_secs()),
            });
        }
    }
    debug!("collected {} input file(s) from {} path(s)", files.len(), inputs.len());
    Ok(files)
}

/// Relative, forward-slash name of `path` under `base`.
fn archive_name(path: &Path, base: &Path) -> io::Result<String> {
    let rel = path.strip_prefix(base).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not under {}", path.display(), base.display()),
        )
    })?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() { 0o444 } else { 0o644 }
}

/// Read every input file.  Output order always matches input order.
#[cfg(not(feature = "parallel"))]
pub fn read_contents(files: &[InputFile]) -> io::Result<Vec<Vec<u8>>> {
    files.iter().map(|f| fs::read(&f.source)).collect()
}

/// Read every input file on the Rayon pool.  Output order always matches
/// input order.
#[cfg(feature = "parallel")]
pub fn read_contents(files: &[InputFile]) -> io::Result<Vec<Vec<u8>>> {
    use rayon::prelude::*;
    files.par_iter().map(|f| fs::read(&f.source)).collect()
}
