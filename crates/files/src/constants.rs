//! Constants shared by the storage modules.

/// Read size used when streaming uploads through the hasher.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Prefix of the temporary file an upload is spooled into before it is renamed.
pub const SPOOL_PREFIX: &str = ".upload-";

/// Prefix of the scratch directory an archive is expanded into.
pub const SCRATCH_PREFIX: &str = ".extract-";

pub const DEFAULT_MAX_ARCHIVE_ENTRIES: usize = 10_000;

/// 8 GiB of uncompressed member data per archive.
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 8 * 1024 * 1024 * 1024;

/// Bytes read from the head of an upload to sniff its container format.
pub const SNIFF_LEN: usize = 8192;

/// Extensions of ZIP-based document containers that are stored as plain files.
pub const ZIP_DOCUMENT_EXTENSIONS: &[&str] = &[
    "docx", "xlsx", "pptx", "odt", "ods", "odp", "epub", "jar", "apk",
];

/// OS metadata files that archives pick up and that are never worth storing.
pub const JUNK_FILE_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Directory created by macOS archivers for resource forks.
pub const JUNK_DIR_NAME: &str = "__MACOSX";
