//! Safe archive expansion.
//!
//! Uploaded archives are untrusted. Before a single byte is written, every entry name
//! is resolved against the scratch root and must stay strictly inside it; one bad
//! entry rejects the whole archive ("zip-slip" defence). Only then are regular files
//! written into the scratch directory, where the caller picks them up and hands each
//! one to the store.

use crate::constants::{
    DEFAULT_MAX_ARCHIVE_ENTRIES, DEFAULT_MAX_EXTRACTED_BYTES, JUNK_DIR_NAME, JUNK_FILE_NAMES,
    SCRATCH_PREFIX, ZIP_DOCUMENT_EXTENSIONS,
};
use crate::FilesError;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

const UNIX_FILE_TYPE_MASK: u32 = 0o170000;
const UNIX_SYMLINK: u32 = 0o120000;

/// How an upload is dispatched, decided once before ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    PlainFile,
    Archive,
}

/// Decides whether an upload is an archive from its name and leading bytes.
///
/// A `.zip` name is always an archive. Otherwise ZIP magic bytes make it one, so a
/// renamed archive is still expanded, unless the name marks a ZIP-based document
/// format such as `.docx`, which is stored as-is.
pub fn detect_upload_kind(name: &str, head: &[u8]) -> UploadKind {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("zip") => UploadKind::Archive,
        // Office and other ZIP-container documents carry ZIP magic but are stored
        // whole. This is the one case where matching magic bytes do not mean Archive.
        Some(ext) if ZIP_DOCUMENT_EXTENSIONS.contains(&ext) => UploadKind::PlainFile,
        _ if infer::archive::is_zip(head) => UploadKind::Archive,
        _ => UploadKind::PlainFile,
    }
}

/// Upper bounds applied while expanding one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    pub max_entries: usize,
    /// Total uncompressed bytes across all members
    pub max_total_bytes: u64,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ARCHIVE_ENTRIES,
            max_total_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
        }
    }
}

/// Resolves an archive entry name below `root`.
///
/// Backslashes count as separators, `.` segments are dropped and `..` segments pop a
/// previously pushed segment. The entry is rejected with `FilesError::PathTraversal`
/// when it is absolute, has a drive prefix, contains a NUL byte, or would climb above
/// `root` at any point.
pub fn resolve_entry_path(root: &Path, entry: &str) -> Result<PathBuf, FilesError> {
    let parts = normalize_entry(entry)?;
    let resolved = parts.iter().fold(root.to_path_buf(), |acc, p| acc.join(p));
    if !resolved.starts_with(root) {
        return Err(traversal(entry));
    }
    Ok(resolved)
}

/// True for OS metadata files that are never stored.
pub fn is_junk_entry(relative_path: &str) -> bool {
    let segments: Vec<&str> = relative_path.split('/').filter(|s| !s.is_empty()).collect();
    let Some(file_name) = segments.last() else {
        return true;
    };
    segments.contains(&JUNK_DIR_NAME)
        || file_name.starts_with("._")
        || JUNK_FILE_NAMES.contains(file_name)
}

fn normalize_entry(entry: &str) -> Result<Vec<String>, FilesError> {
    if entry.contains('\0') {
        return Err(traversal(entry));
    }

    let unified = entry.replace('\\', "/");
    let bytes = unified.as_bytes();
    let drive_prefix = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if unified.starts_with('/') || drive_prefix {
        return Err(traversal(entry));
    }

    let mut parts: Vec<String> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(traversal(entry));
                }
            }
            other => parts.push(other.to_string()),
        }
    }
    Ok(parts)
}

fn traversal(entry: &str) -> FilesError {
    FilesError::PathTraversal {
        entry: entry.to_string(),
    }
}

/// One regular file written out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedMember {
    /// Normalised path inside the archive, `/`-separated
    pub relative_path: String,
    /// Location of the extracted file inside the scratch directory
    pub path: PathBuf,
}

/// Extracted contents of an archive, living in a scratch directory until cleaned up.
#[derive(Debug)]
pub struct ExpandedArchive {
    scratch: TempDir,
    members: Vec<ExpandedMember>,
}

impl ExpandedArchive {
    pub fn root(&self) -> &Path {
        self.scratch.path()
    }

    /// Regular, non-junk files in archive order.
    pub fn members(&self) -> &[ExpandedMember] {
        &self.members
    }

    /// Removes the scratch directory. Failure is logged, not returned.
    pub fn cleanup(self) {
        discard_scratch(self.scratch);
    }
}

fn discard_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch directory");
    }
}

struct PlannedEntry {
    index: usize,
    relative_path: String,
    target: PathBuf,
}

/// Expands ZIP archives into scratch directories after validating every entry.
#[derive(Debug, Clone, Default)]
pub struct SafeArchiveExpander {
    limits: ExtractionLimits,
}

impl SafeArchiveExpander {
    pub fn new(limits: ExtractionLimits) -> Self {
        Self { limits }
    }

    /// Expands `archive_path` into a new scratch directory created inside `parent`.
    ///
    /// # Errors
    ///
    /// - `FilesError::PathTraversal` if any entry escapes the scratch root; nothing
    ///   has been written at that point
    /// - `FilesError::CorruptArchive` if the archive or an entry cannot be read
    /// - `FilesError::ArchiveLimitExceeded` if the entry count or total size is too large
    /// - `FilesError::Io` if writing into the scratch directory fails
    ///
    /// On error the scratch directory is removed.
    pub fn expand(&self, archive_path: &Path, parent: &Path) -> Result<ExpandedArchive, FilesError> {
        let file = fs::File::open(archive_path)?;
        let mut archive = ZipArchive::new(file)?;

        if archive.len() > self.limits.max_entries {
            return Err(FilesError::ArchiveLimitExceeded(format!(
                "{} entries (limit {})",
                archive.len(),
                self.limits.max_entries
            )));
        }

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)?;

        let result = self
            .plan(&mut archive, scratch.path())
            .and_then(|plan| self.write_members(&mut archive, plan));

        match result {
            Ok(members) => Ok(ExpandedArchive { scratch, members }),
            Err(e) => {
                discard_scratch(scratch);
                Err(e)
            }
        }
    }

    /// Validates every entry and decides which ones to write. Writes nothing.
    fn plan<R: Read + io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        root: &Path,
    ) -> Result<Vec<PlannedEntry>, FilesError> {
        let mut declared_total: u64 = 0;
        let mut seen = HashSet::new();
        let mut plan = Vec::new();

        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            let name = entry.name().to_string();

            let parts = match normalize_entry(&name) {
                Ok(parts) => parts,
                Err(e) => {
                    tracing::warn!(
                        security = "path_traversal",
                        entry = %name,
                        "rejecting archive with unsafe entry path"
                    );
                    return Err(e);
                }
            };
            let target = resolve_entry_path(root, &name)?;

            if entry.is_dir() {
                continue;
            }
            if parts.is_empty() {
                tracing::warn!(
                    security = "path_traversal",
                    entry = %name,
                    "rejecting archive with file entry resolving to the extraction root"
                );
                return Err(traversal(&name));
            }

            declared_total = declared_total.saturating_add(entry.size());
            if declared_total > self.limits.max_total_bytes {
                return Err(FilesError::ArchiveLimitExceeded(format!(
                    "more than {} uncompressed bytes",
                    self.limits.max_total_bytes
                )));
            }

            let is_symlink = entry
                .unix_mode()
                .is_some_and(|mode| mode & UNIX_FILE_TYPE_MASK == UNIX_SYMLINK);
            let relative_path = parts.join("/");
            if is_symlink || is_junk_entry(&relative_path) {
                tracing::debug!(entry = %name, is_symlink, "skipping archive entry");
                continue;
            }

            if seen.insert(target.clone()) {
                plan.push(PlannedEntry {
                    index,
                    relative_path,
                    target,
                });
            }
        }

        Ok(plan)
    }

    fn write_members<R: Read + io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        plan: Vec<PlannedEntry>,
    ) -> Result<Vec<ExpandedMember>, FilesError> {
        let mut remaining = self.limits.max_total_bytes;
        let mut buffer = vec![0u8; 64 * 1024];
        let mut members = Vec::with_capacity(plan.len());

        for planned in plan {
            if let Some(parent) = planned.target.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut entry = archive.by_index(planned.index)?;
            let mut out = fs::File::create(&planned.target)?;
            loop {
                let read = match entry.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        return Err(FilesError::CorruptArchive(format!(
                            "cannot read entry {}: {}",
                            planned.relative_path, e
                        )))
                    }
                };
                remaining = remaining.checked_sub(read as u64).ok_or_else(|| {
                    FilesError::ArchiveLimitExceeded(format!(
                        "more than {} uncompressed bytes",
                        self.limits.max_total_bytes
                    ))
                })?;
                out.write_all(&buffer[..read])?;
            }

            members.push(ExpandedMember {
                relative_path: planned.relative_path,
                path: planned.target,
            });
        }

        Ok(members)
    }
}

/// Display name of an archive member: `<archive stem>/<path inside archive>`.
pub fn member_display_name(archive_name: &str, relative_path: &str) -> String {
    let stem = Path::new(archive_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("archive");
    format!("{stem}/{relative_path}")
}
