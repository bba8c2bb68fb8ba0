//! # PFS Core
//!
//! Core logic of the patient file store: the metadata index, the ingestion
//! orchestrator, retrieval, deletion and report export replacement.
//!
//! Byte-level concerns (hashing, canonical naming, archive expansion) live in
//! `pfs_files`; this crate pairs every stored blob with a [`StoredFile`] row and keeps
//! rows and physical files consistent across upload, delete and entity purge.
//!
//! **No front-end concerns**: argument parsing, environment handling and output
//! formatting belong in the `pfs` binary.

pub mod config;
pub mod constants;
pub mod error;
pub mod index;
pub mod ingest;
pub mod lifecycle;
pub mod reports;
pub mod resolve;
pub mod service;

pub use config::{
    extraction_limits_from_env_values, optional_path_from_env_value, storage_root_from_env_value,
    CoreConfig,
};
pub use error::{IngestError, IngestResult};
pub use index::{FileIndex, MemoryIndex, NewStoredFile, SqliteIndex, StoredFile};
pub use ingest::{
    BucketReport, IngestBatch, IngestReport, ModalityBatch, Upload, UploadOutcome, UploadSource,
};
pub use lifecycle::IntegrityReport;
pub use resolve::ResolvedFile;
pub use service::FileService;

pub use pfs_files::{Bucket, ExtractionLimits};
pub use pfs_types::{EntityId, FileId, Modality, NonEmptyText, ReportFormat};
