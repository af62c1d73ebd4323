//! CMOD packaging: module directory layout, info files and the archive
//! container.

pub mod archive;
pub mod info;
pub mod structure;

use std::path::PathBuf;

use thiserror::Error;

pub use archive::{ArchiveEntry, CompressionLevel};
pub use info::{CmodInfo, ExportTable};
pub use structure::{CmodStructure, SubModule};

/// Packaging and archive failures. These are operational errors, fatal
/// for the operation that raised them but never for other operations.
#[derive(Debug, Error)]
pub enum CmodError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid module structure: {0}")]
    InvalidStructure(String),
    #[error("malformed info file: {0}")]
    MalformedInfo(String),
    #[error("archive entry escapes extraction root: {0}")]
    EntryEscapesRoot(String),
    #[error("checksum mismatch in entry `{0}`")]
    ChecksumMismatch(String),
    #[error("not a CMOD archive: {0}")]
    NotAnArchive(PathBuf),
}
