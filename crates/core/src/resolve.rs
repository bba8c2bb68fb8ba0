//! Retrieval Resolver.
//!
//! Maps a `(modality, id)` pair to its metadata row and physical path. Resolution
//! itself never touches the filesystem; [`ResolvedFile::exists`] and
//! [`ResolvedFile::open`] do, so callers can tell a missing row (data error) from a
//! missing file (recoverable by re-upload).

use crate::index::{FileIndex, StoredFile};
use crate::service::FileService;
use crate::{IngestError, IngestResult};
use pfs_files::FilesError;
use pfs_types::{FileId, Modality};
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;

/// A metadata row together with the physical path it points at.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResolvedFile {
    pub file: StoredFile,
    pub path: PathBuf,
}

impl ResolvedFile {
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Name offered to the user when downloading.
    ///
    /// Report exports get their format's extension appended to the display name.
    pub fn download_name(&self) -> String {
        match self.file.report_format {
            Some(format) => format!("{}.{}", self.file.display_name, format.extension()),
            None => self.file.display_name.clone(),
        }
    }

    /// Opens the physical file for reading.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::FileMissing` if the file is not on disk.
    pub fn open(&self) -> IngestResult<File> {
        File::open(&self.path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                tracing::warn!(
                    id = %self.file.id,
                    path = %self.path.display(),
                    "stored file missing on disk"
                );
                IngestError::FileMissing {
                    path: self.path.clone(),
                }
            } else {
                IngestError::Files(FilesError::Io(e))
            }
        })
    }
}

impl<I: FileIndex> FileService<I> {
    /// Looks up the row `id` of `modality` and computes
    /// `{root}/{bucket}/{canonical name}`.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::NotFound` if there is no such row for this modality.
    pub fn resolve_path(&self, modality: Modality, id: FileId) -> IngestResult<ResolvedFile> {
        let Some(file) = self.index().get(modality, id)? else {
            tracing::error!(modality = %modality, id = %id, "no metadata row for requested file");
            return Err(IngestError::NotFound { modality, id });
        };

        let path = self
            .store()
            .physical_path(&file.bucket, &file.canonical_name);
        Ok(ResolvedFile { file, path })
    }
}
