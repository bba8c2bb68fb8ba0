//! Row lifecycle: explicit deletion, entity purge, listing and integrity checks.

use crate::index::{FileIndex, StoredFile};
use crate::service::FileService;
use crate::{IngestError, IngestResult};
use pfs_files::{hash_reader, Bucket, ContentDigests, FilesError};
use pfs_types::{EntityId, FileId, Modality};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Outcome of re-hashing a stored file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IntegrityReport {
    pub id: FileId,
    pub path: PathBuf,
    pub expected: ContentDigests,
    pub actual: ContentDigests,
    pub size_bytes: u64,
}

impl IntegrityReport {
    /// The SHA-256 digest is authoritative.
    pub fn is_intact(&self) -> bool {
        self.expected.sha256 == self.actual.sha256
    }

    /// Turns a mismatch into `IngestError::IntegrityMismatch`.
    pub fn into_result(self) -> IngestResult<Self> {
        if self.is_intact() {
            Ok(self)
        } else {
            Err(IngestError::IntegrityMismatch {
                id: self.id,
                expected: self.expected.sha256,
                actual: self.actual.sha256,
            })
        }
    }
}

impl<I: FileIndex> FileService<I> {
    /// Deletes rows of one bucket by id, physical file first (best effort).
    ///
    /// Ids that do not belong to `entity` and `modality` are skipped. Returns the ids
    /// that were actually deleted.
    pub fn delete(
        &self,
        entity: EntityId,
        modality: Modality,
        ids: &[FileId],
    ) -> IngestResult<Vec<FileId>> {
        let bucket = Bucket::new(modality, entity);
        let mut deleted = Vec::with_capacity(ids.len());
        for &id in ids {
            if self.delete_one(bucket, id)? {
                deleted.push(id);
            }
        }
        Ok(deleted)
    }

    /// Removes every row of `entity` across all modalities and prunes the empty bucket
    /// directories. Returns the number of rows removed.
    pub fn purge_entity(&self, entity: EntityId) -> IngestResult<usize> {
        let rows = self.index().list_entity(entity)?;
        for row in &rows {
            self.discard_row(row)?;
        }

        for modality in Modality::ALL {
            let bucket = Bucket::new(modality, entity);
            if self.store().prune_bucket(&bucket) {
                tracing::debug!(bucket = %bucket, "removed empty bucket directory");
            }
        }

        tracing::info!(entity = %entity, rows = rows.len(), "purged entity files");
        Ok(rows.len())
    }

    pub fn list(&self, entity: EntityId, modality: Modality) -> IngestResult<Vec<StoredFile>> {
        self.index().list(entity, modality)
    }

    pub fn list_entity(&self, entity: EntityId) -> IngestResult<Vec<StoredFile>> {
        self.index().list_entity(entity)
    }

    /// Modalities holding at least one row for `entity`, in directory order.
    pub fn modalities_with_files(&self, entity: EntityId) -> IngestResult<Vec<Modality>> {
        let present: BTreeSet<Modality> = self
            .index()
            .list_entity(entity)?
            .into_iter()
            .map(|row| row.modality)
            .collect();
        Ok(present.into_iter().collect())
    }

    /// Re-hashes the physical file behind a row and compares it with the recorded
    /// digests.
    ///
    /// # Errors
    ///
    /// - `IngestError::NotFound` if the row does not exist
    /// - `IngestError::FileMissing` if the physical file is gone
    pub fn verify(&self, modality: Modality, id: FileId) -> IngestResult<IntegrityReport> {
        let resolved = self.resolve_path(modality, id)?;
        let file = resolved.open()?;
        let (actual, size_bytes) = hash_reader(file).map_err(FilesError::from)?;

        let report = IntegrityReport {
            id,
            path: resolved.path,
            expected: ContentDigests {
                md5: resolved.file.md5,
                sha256: resolved.file.sha256,
            },
            actual,
            size_bytes,
        };

        if !report.is_intact() {
            tracing::error!(
                id = %id,
                path = %report.path.display(),
                expected = %report.expected.sha256,
                actual = %report.actual.sha256,
                "stored file failed integrity check"
            );
        }
        Ok(report)
    }
}
