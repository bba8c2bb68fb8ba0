//! Patient File Storage
//!
//! This crate holds the leaves of the patient file ingestion pipeline: hashing, the
//! on-disk bucket layout, the content-addressed store and the safe archive expander.
//! It knows nothing about metadata rows; `pfs-core` builds those on top.
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_root>/
//! └── <modality>/          # mri, pet, eeg, seeg, info
//!     └── <entity_id>/     # one bucket per entity and modality
//!         ├── 5d41402abc4b2a76b9719d911017c592.txt
//!         └── .extract-XXXX/  # transient scratch dir while expanding an archive
//! ```
//!
//! Stored files are named `<md5><lowercased extension>`. The name is always derived
//! from the content, never taken from the caller, so identical bytes land on the same
//! path and a second write is a harmless overwrite with identical content.
//!
//! ## Example Usage
//!
//! ```no_run
//! use pfs_files::{Bucket, ContentStore};
//! use pfs_types::{EntityId, Modality};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ContentStore::new(Path::new("large_files"))?;
//! let bucket = Bucket::new(Modality::Eeg, EntityId::new(7));
//! let blob = store.put(&bucket, "night-recording.EDF", &b"..."[..])?;
//! assert!(blob.canonical_name.ends_with(".edf"));
//! # Ok(())
//! # }
//! ```

mod archive;
mod constants;
mod hasher;
mod layout;
mod store;

pub use archive::{
    detect_upload_kind, is_junk_entry, member_display_name, resolve_entry_path, ExpandedArchive, ExpandedMember,
    ExtractionLimits, SafeArchiveExpander, UploadKind,
};
pub use constants::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ARCHIVE_ENTRIES, DEFAULT_MAX_EXTRACTED_BYTES};
pub use hasher::{hash_reader, hash_reader_with_chunk_size, ContentDigests, ContentHasher};
pub use layout::Bucket;
pub use store::{canonical_extension, canonical_name, ContentStore, SpooledUpload, StoredBlob};

use std::path::PathBuf;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory is unusable
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Bucket directory could not be created
    #[error("failed to create bucket directory {path}: {source}", path = path.display())]
    BucketCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the caller's byte stream failed
    #[error("failed to read upload stream: {0}")]
    SourceRead(#[source] std::io::Error),

    /// Moving a spooled file to its canonical name failed
    #[error("failed to commit file to {path}: {source}", path = path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive could not be opened or one of its entries could not be read
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// Archive entry would resolve outside the extraction root
    #[error("unsafe archive entry path: {entry}")]
    PathTraversal { entry: String },

    /// Archive exceeds the configured entry count or uncompressed size
    #[error("archive exceeds extraction limits: {0}")]
    ArchiveLimitExceeded(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilesError {
    /// True when the error is a security violation rather than an ordinary failure.
    pub fn is_security_violation(&self) -> bool {
        matches!(self, FilesError::PathTraversal { .. })
    }

    /// True when the error concerns the archive as a whole.
    pub fn is_archive_failure(&self) -> bool {
        matches!(
            self,
            FilesError::CorruptArchive(_)
                | FilesError::PathTraversal { .. }
                | FilesError::ArchiveLimitExceeded(_)
        )
    }
}

impl From<zip::result::ZipError> for FilesError {
    fn from(err: zip::result::ZipError) -> Self {
        FilesError::CorruptArchive(err.to_string())
    }
}
