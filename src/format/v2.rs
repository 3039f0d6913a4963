//! Format v2: zip (stored entries) → zstd → AES-256-GCM.  Current default.
//!
//! Encryption is mandatory.  The zip container never compresses its own
//! entries; compression happens once, over the whole container, at the
//! level recorded in the header.
//!
//! Reading has to buffer: a zip container is located through its trailing
//! central directory, so the decompressed container must be fully in memory
//! before the first entry can be found.

use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{corrupt, restore_dir, restore_file, run_extraction, FormatCodec, FormatVersion};
use crate::archive::{ArchiveEntry, CreateOptions, EntryKind, ExtractReport};
use crate::codec::{Codec, ZstdCodec};
use crate::crypto::{derive_key, PayloadCipher};
use crate::error::{ArchiveError, ExtractFailure, Result};
use crate::guard::ExtractionGuard;
use crate::header::HeaderV2;
use crate::walk::{collect_inputs, read_contents, InputFile};

pub struct V2Format;

impl FormatCodec for V2Format {
    fn version(&self) -> FormatVersion {
        FormatVersion::V2
    }

    fn build(&self, dest: &Path, inputs: &[PathBuf], password: &str, opts: &CreateOptions) -> Result<()> {
        build(dest, inputs, password, opts)
    }

    fn extract(&self, archive: &Path, out_dir: &Path, password: &str)
        -> std::result::Result<ExtractReport, ExtractFailure>
    {
        extract(archive, out_dir, password)
    }

    fn list(&self, archive: &Path, password: &str) -> Result<Vec<ArchiveEntry>> {
        list(archive, password)
    }
}

// ── Build ────────────────────────────────────────────────────────────────────

/// Nothing touches the filesystem until the password and input list have
/// been checked, and the archive file is only created once the sealed
/// payload exists.
pub fn build(dest: &Path, inputs: &[PathBuf], password: &str, opts: &CreateOptions) -> Result<()> {
    if password.is_empty() {
        return Err(ArchiveError::PasswordRequired);
    }
    if inputs.is_empty() {
        return Err(ArchiveError::NoInputs);
    }

    let files = collect_inputs(inputs)?;
    let contents = read_contents(&files)?;
    let container = pack_zip(&files, &contents)?;
    let compressed = ZstdCodec.compress(&container, opts.level)?;

    let header = HeaderV2::new(opts.level, opts.kdf);
    let key = derive_key(password.as_bytes(), &header.salt, &header.kdf)?;
    let sealed = PayloadCipher::new(&key, &header.nonce).seal(&compressed)?;
    drop(key);

    let mut out = BufWriter::new(File::create(dest)?);
    header.write(&mut out)?;
    out.write_all(&sealed)?;
    out.flush()?;
    debug!(
        "wrote v2 archive {} ({} entries, level {}, {} -> {} bytes)",
        dest.display(),
        files.len(),
        opts.level,
        container.len(),
        compressed.len()
    );
    Ok(())
}

fn zip_write_error(e: ZipError) -> ArchiveError {
    match e {
        ZipError::Io(e) => ArchiveError::Io(e),
        other => ArchiveError::Compression(other.to_string()),
    }
}

fn pack_zip(files: &[InputFile], contents: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (file, data) in files.iter().zip(contents) {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(file.mode)
            .large_file(data.len() as u64 >= u64::from(u32::MAX));
        zip.start_file(file.name.as_str(), options).map_err(zip_write_error)?;
        zip.write_all(data)?;
    }
    Ok(zip.finish().map_err(zip_write_error)?.into_inner())
}

// ── Read ─────────────────────────────────────────────────────────────────────

/// Open a v2 archive and return the decompressed zip container.
fn open_container(archive: &Path, password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(ArchiveError::PasswordRequired);
    }
    let mut reader = BufReader::new(File::open(archive)?);
    let header = HeaderV2::read(&mut reader)?;
    let mut sealed = Vec::new();
    reader.read_to_end(&mut sealed)?;
    drop(reader);

    let key = derive_key(password.as_bytes(), &header.salt, &header.kdf)?;
    let compressed = PayloadCipher::new(&key, &header.nonce).open(&sealed)?;
    drop(key);
    Ok(ZstdCodec.decompress(&compressed)?)
}

fn entry_mode(unix_mode: Option<u32>, is_dir: bool) -> u32 {
    match unix_mode {
        Some(mode) => mode & 0o7777,
        None if is_dir => 0o755,
        None => 0o644,
    }
}

pub fn extract(archive: &Path, out_dir: &Path, password: &str)
    -> std::result::Result<ExtractReport, ExtractFailure>
{
    let container = open_container(archive, password)?;
    run_extraction(out_dir, |guard, extracted| unpack(&container, guard, extracted))
}

fn unpack(container: &[u8], guard: &mut ExtractionGuard, extracted: &mut Vec<String>) -> Result<()> {
    let mut zip = ZipArchive::new(Cursor::new(container)).map_err(corrupt)?;
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).map_err(corrupt)?;
        let name = file.name().to_owned();
        let Some(target) = guard.resolve(&name) else {
            continue;
        };
        let is_dir = file.is_dir();
        let mode = entry_mode(file.unix_mode(), is_dir);
        if is_dir {
            restore_dir(&target, mode)?;
        } else {
            restore_file(&target, mode, &mut file)?;
        }
        extracted.push(name);
    }
    Ok(())
}

pub fn list(archive: &Path, password: &str) -> Result<Vec<ArchiveEntry>> {
    let container = open_container(archive, password)?;
    let mut zip = ZipArchive::new(Cursor::new(container.as_slice())).map_err(corrupt)?;
    let mut entries = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let file = zip.by_index(i).map_err(corrupt)?;
        let is_dir = file.is_dir();
        entries.push(ArchiveEntry {
            name: file.name().to_owned(),
            size: file.size(),
            mode: entry_mode(file.unix_mode(), is_dir),
            kind: if is_dir { EntryKind::Directory } else { EntryKind::File },
        });
    }
    Ok(entries)
}
