pub mod header;
pub mod crypto;
pub mod codec;
pub mod walk;
pub mod guard;
pub mod format;
pub mod archive;
pub mod error;

pub use archive::{
    create_archive, create_archive_with, detect_version, extract_archive, inspect_header,
    list_archive_contents, ArchiveEntry, CreateOptions, EntryKind, ExtractReport,
};
pub use codec::CompressionLevel;
pub use error::{ArchiveError, ExtractFailure, Result};
pub use format::{FormatCodec, FormatVersion};
pub use header::{Header, KdfParams};
