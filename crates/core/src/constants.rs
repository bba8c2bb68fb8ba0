//! Constants used throughout the core crate.
//!
//! This module contains the default paths and environment variable names so that the
//! binary and the tests agree on them.

use std::time::Duration;

/// Default storage root when no explicit directory is configured.
pub const DEFAULT_STORAGE_ROOT: &str = "large_files";

/// File name of the persisted metadata index inside the storage root.
pub const INDEX_FILENAME: &str = "stored_files.sqlite3";

/// How long a writer waits for another connection's lock before giving up.
pub const INDEX_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub const INDEX_MAX_CONNECTIONS: u32 = 4;

/// Worker threads of the runtime driving the index connections.
pub const INDEX_WORKER_THREADS: usize = 2;

/// Environment variable overriding the storage root.
pub const STORAGE_ROOT_ENV: &str = "PFS_STORAGE_ROOT";

/// Environment variable overriding the metadata index location.
pub const INDEX_PATH_ENV: &str = "PFS_INDEX_PATH";

pub const MAX_ARCHIVE_ENTRIES_ENV: &str = "PFS_MAX_ARCHIVE_ENTRIES";

pub const MAX_EXTRACTED_BYTES_ENV: &str = "PFS_MAX_EXTRACTED_BYTES";
