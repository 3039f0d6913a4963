//! Format v1: tar stream → xz → optional AES-256-GCM.
//!
//! Legacy format.  Readers must support it forever; [`build`] is kept for
//! compatibility testing and is never selected by `create_archive`.
//!
//! An empty password produces a plaintext archive (protection mode 0, all
//! KDF fields zero).  Any other password seals the whole compressed stream
//! as one AEAD blob.

use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use xz2::read::XzDecoder;
use std::path::{Path, PathBuf};

use super::{corrupt, restore_dir, restore_file, run_extraction, FormatCodec, FormatVersion};
use crate::archive::{ArchiveEntry, CreateOptions, EntryKind, ExtractReport};
use crate::codec::{Codec, CompressionLevel, XzCodec};
use crate::crypto::{derive_key, PayloadCipher};
use crate::error::{ArchiveError, ExtractFailure, Result};
use crate::guard::ExtractionGuard;
use crate::header::{HeaderV1, KdfParams};
use crate::walk::{collect_inputs, read_contents, InputFile};

pub struct V1Format;

impl FormatCodec for V1Format {
    fn version(&self) -> FormatVersion {
        FormatVersion::V1
    }

    fn build(&self, dest: &Path, inputs: &[PathBuf], password: &str, opts: &CreateOptions) -> Result<()> {
        build(dest, inputs, password, &opts.kdf)
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

pub fn build(dest: &Path, inputs: &[PathBuf], password: &str, kdf: &KdfParams) -> Result<()> {
    if inputs.is_empty() {
        return Err(ArchiveError::NoInputs);
    }
    let files = collect_inputs(inputs)?;
    let contents = read_contents(&files)?;
    let tar_stream = pack_tar(&files, &contents)?;
    let compressed = XzCodec.compress(&tar_stream, CompressionLevel::Default)?;

    let (header, payload) = if password.is_empty() {
        (HeaderV1::plaintext(), compressed)
    } else {
        let header = HeaderV1::encrypted(*kdf);
        let key = derive_key(password.as_bytes(), &header.salt, &header.kdf)?;
        let sealed = PayloadCipher::new(&key, &header.nonce).seal(&compressed)?;
        (header, sealed)
    };

    let mut out = BufWriter::new(File::create(dest)?);
    header.write(&mut out)?;
    out.write_all(&payload)?;
    out.flush()?;
    debug!(
        "wrote v1 archive {} ({} entries, {} payload bytes, encrypted={})",
        dest.display(),
        files.len(),
        payload.len(),
        header.is_encrypted()
    );
    Ok(())
}

fn pack_tar(files: &[InputFile], contents: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for (file, data) in files.iter().zip(contents) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(file.mode);
        header.set_mtime(file.mtime);
        builder.append_data(&mut header, &file.name, data.as_slice())?;
    }
    Ok(builder.into_inner()?)
}

// ── Read ─────────────────────────────────────────────────────────────────────

/// Open a v1 archive and return a decoder over its tar stream.
///
/// Plaintext payloads are decoded straight from the file handle.  A sealed
/// payload has to be read whole and authenticated before its first byte may
/// be trusted; the decoder then streams over the opened buffer.
fn open_payload(archive: &Path, password: &str) -> Result<XzDecoder<Box<dyn Read>>> {
    let mut reader = BufReader::new(File::open(archive)?);
    let header = HeaderV1::read(&mut reader)?;

    let payload: Box<dyn Read> = if !header.is_encrypted() {
        Box::new(reader)
    } else {
        if password.is_empty() {
            return Err(ArchiveError::PasswordRequired);
        }
        let mut sealed = Vec::new();
        reader.read_to_end(&mut sealed)?;
        drop(reader);

        let key = derive_key(password.as_bytes(), &header.salt, &header.kdf)?;
        Box::new(Cursor::new(PayloadCipher::new(&key, &header.nonce).open(&sealed)?))
    };
    Ok(XzCodec.decoder(payload))
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

fn entry_kind(entry_type: tar::EntryType) -> EntryKind {
    if entry_type.is_file() {
        EntryKind::File
    } else if entry_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::Other
    }
}

pub fn extract(archive: &Path, out_dir: &Path, password: &str)
    -> std::result::Result<ExtractReport, ExtractFailure>
{
    let tar_stream = open_payload(archive, password)?;
    run_extraction(out_dir, |guard, extracted| unpack(tar_stream, guard, extracted))
}

fn unpack<R: Read>(tar_stream: R, guard: &mut ExtractionGuard, extracted: &mut Vec<String>) -> Result<()> {
    let mut archive = tar::Archive::new(tar_stream);
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let name = entry_name(&entry);
        let Some(target) = guard.resolve(&name) else {
            continue;
        };
        let mode = entry.header().mode().map_err(corrupt)?;
        match entry_kind(entry.header().entry_type()) {
            EntryKind::Directory => restore_dir(&target, mode)?,
            EntryKind::File => restore_file(&target, mode, &mut entry)?,
            EntryKind::Other => {
                debug!("ignoring {name:?}: not a file or directory");
                continue;
            }
        }
        extracted.push(name);
    }
    Ok(())
}

pub fn list(archive: &Path, password: &str) -> Result<Vec<ArchiveEntry>> {
    let mut archive = tar::Archive::new(open_payload(archive, password)?);
    let mut entries = Vec::new();
    for entry in archive.entries().map_err(corrupt)? {
        let entry = entry.map_err(corrupt)?;
        let header = entry.header();
        entries.push(ArchiveEntry {
            name: entry_name(&entry),
            size: entry.size(),
            mode: header.mode().map_err(corrupt)? & 0o7777,
            kind: entry_kind(header.entry_type()),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CHEAP: KdfParams = KdfParams { time_cost: 1, memory_kib: 64, parallelism: 1 };

    #[test]
    fn plaintext_archive_has_zeroed_crypto_header() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("note.txt");
        fs::write(&input, b"plain").unwrap();
        let archive = dir.path().join("plain.btxz");

        build(&archive, &[input], "", &CHEAP).unwrap();

        let bytes = fs::read(&archive).unwrap();
        assert_eq!(&bytes[0..6], b"BTXZ\x01\x00");
        assert_eq!(bytes[6], 0);
        assert_eq!(bytes[7], 0);
        assert!(bytes[8..45].iter().all(|&b| b == 0));
        // xz stream magic follows the header directly.
        assert_eq!(&bytes[45..51], &[0xFD, b'7', b'z', b'X', b'Z', 0x00]);
    }

    #[test]
    fn encrypted_archive_requires_password_to_read() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("note.txt");
        fs::write(&input, b"secret").unwrap();
        let archive = dir.path().join("sealed.btxz");

        build(&archive, &[input], "pw", &CHEAP).unwrap();

        let err = list(&archive, "").unwrap_err();
        assert!(matches!(err, ArchiveError::PasswordRequired));
        let entries = list(&archive, "pw").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "note.txt");
        assert_eq!(entries[0].size, 6);
    }

    #[test]
    fn payload_is_smaller_than_its_tar_stream() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("log.txt");
        let text = b"2024-05-01 INFO request served in 3ms\n".repeat(20_000);
        fs::write(&input, &text).unwrap();
        let archive = dir.path().join("log.btxz");

        build(&archive, &[input], "", &CHEAP).unwrap();

        let size = fs::metadata(&archive).unwrap().len() as usize;
        assert!(size * 50 < text.len(), "{} byte archive for {} bytes of text", size, text.len());
        assert_eq!(list(&archive, "").unwrap()[0].size, text.len() as u64);
    }

    #[test]
    fn empty_input_list_is_rejected() {
        let dir = tempdir().unwrap();
        let err = build(&dir.path().join("x.btxz"), &[], "", &CHEAP).unwrap_err();
        assert!(matches!(err, ArchiveError::NoInputs));
    }
}
