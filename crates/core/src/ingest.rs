//! Ingestion Orchestrator.
//!
//! A batch carries, per modality, the uploads to store and the row ids to delete for
//! one entity. Each modality bucket is processed on its own scoped thread: deletions
//! first, then uploads in order. A failure affects only its own upload (or archive);
//! the rest of the batch carries on.

use crate::index::{FileIndex, NewStoredFile, StoredFile};
use crate::service::FileService;
use crate::{IngestError, IngestResult};
use pfs_files::{
    canonical_extension, detect_upload_kind, member_display_name, Bucket, FilesError,
    SpooledUpload, UploadKind,
};
use pfs_types::{EntityId, FileId, Modality, NonEmptyText};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;

/// Where the bytes of an upload come from.
pub enum UploadSource {
    /// A file on local disk; its name also serves as the extension fallback
    Path(PathBuf),
    /// Any byte stream, read exactly once
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            UploadSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// One named upload.
#[derive(Debug)]
pub struct Upload {
    name: String,
    source: UploadSource,
}

impl Upload {
    /// Upload of a file on disk, displayed under its file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            source: UploadSource::Path(path),
        }
    }

    /// Upload of a file on disk under an explicit display name.
    pub fn named_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: UploadSource::Path(path.into()),
        }
    }

    pub fn from_reader(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            name: name.into(),
            source: UploadSource::Reader(Box::new(reader)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Uploads and deletions for one modality bucket.
#[derive(Debug, Default)]
pub struct ModalityBatch {
    pub uploads: Vec<Upload>,
    pub delete: BTreeSet<FileId>,
}

/// Everything submitted for one entity in one request.
#[derive(Debug, Default)]
pub struct IngestBatch {
    buckets: BTreeMap<Modality, ModalityBatch>,
}

impl IngestBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modality_mut(&mut self, modality: Modality) -> &mut ModalityBatch {
        self.buckets.entry(modality).or_default()
    }

    #[must_use]
    pub fn with_upload(mut self, modality: Modality, upload: Upload) -> Self {
        self.modality_mut(modality).uploads.push(upload);
        self
    }

    #[must_use]
    pub fn with_delete(mut self, modality: Modality, id: FileId) -> Self {
        self.modality_mut(modality).delete.insert(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buckets
            .values()
            .all(|b| b.uploads.is_empty() && b.delete.is_empty())
    }
}

/// Result of one upload. An archive yields one row per stored member.
#[derive(Debug)]
pub struct UploadOutcome {
    pub name: String,
    pub result: IngestResult<Vec<StoredFile>>,
}

/// What happened in one bucket.
#[derive(Debug)]
pub struct BucketReport {
    pub bucket: Bucket,
    pub deleted: Vec<FileId>,
    pub delete_failures: Vec<(FileId, IngestError)>,
    pub uploads: Vec<UploadOutcome>,
}

impl BucketReport {
    fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            deleted: Vec::new(),
            delete_failures: Vec::new(),
            uploads: Vec::new(),
        }
    }
}

/// Per-bucket results of a batch, in modality order.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub buckets: Vec<BucketReport>,
}

impl IngestReport {
    /// Every row created by the batch.
    pub fn stored(&self) -> impl Iterator<Item = &StoredFile> {
        self.buckets
            .iter()
            .flat_map(|b| &b.uploads)
            .filter_map(|u| u.result.as_ref().ok())
            .flatten()
    }

    /// Uploads that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &IngestError)> {
        self.buckets
            .iter()
            .flat_map(|b| &b.uploads)
            .filter_map(|u| u.result.as_ref().err().map(|e| (u.name.as_str(), e)))
    }

    pub fn deleted(&self) -> impl Iterator<Item = FileId> + '_ {
        self.buckets.iter().flat_map(|b| b.deleted.iter().copied())
    }

    pub fn is_success(&self) -> bool {
        self.buckets
            .iter()
            .all(|b| b.delete_failures.is_empty() && b.uploads.iter().all(|u| u.result.is_ok()))
    }
}

impl<I: FileIndex> FileService<I> {
    /// Runs a batch for `entity`.
    ///
    /// Within a bucket, every deletion completes before the first upload is written.
    /// Buckets are independent directories and run concurrently. Files already
    /// committed stay committed if a later item fails.
    pub fn ingest(&self, entity: EntityId, batch: IngestBatch) -> IngestReport {
        let buckets: Vec<BucketReport> = thread::scope(|scope| {
            let handles: Vec<_> = batch
                .buckets
                .into_iter()
                .map(|(modality, work)| {
                    let bucket = Bucket::new(modality, entity);
                    scope.spawn(move || self.ingest_bucket(bucket, work))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(report) => report,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        IngestReport { buckets }
    }

    fn ingest_bucket(&self, bucket: Bucket, work: ModalityBatch) -> BucketReport {
        let mut report = BucketReport::new(bucket);

        for id in work.delete {
            match self.delete_one(bucket, id) {
                Ok(true) => report.deleted.push(id),
                Ok(false) => {
                    tracing::debug!(bucket = %bucket, id = %id, "nothing to delete for id")
                }
                Err(e) => {
                    tracing::warn!(bucket = %bucket, id = %id, error = %e, "delete failed");
                    report.delete_failures.push((id, e));
                }
            }
        }

        for upload in work.uploads {
            let name = upload.name.clone();
            let result = self.ingest_upload(&bucket, upload);
            if let Err(e) = &result {
                if e.is_security_violation() {
                    tracing::warn!(
                        security = "path_traversal",
                        bucket = %bucket,
                        upload = %name,
                        error = %e,
                        "archive rejected"
                    );
                } else {
                    tracing::warn!(bucket = %bucket, upload = %name, error = %e, "upload failed");
                }
            }
            report.uploads.push(UploadOutcome { name, result });
        }

        report
    }

    fn ingest_upload(&self, bucket: &Bucket, upload: Upload) -> IngestResult<Vec<StoredFile>> {
        if !bucket.modality().accepts_uploads() {
            return Err(IngestError::UploadNotAccepted(bucket.modality()));
        }
        let Upload { name, source } = upload;
        let name = NonEmptyText::new(&name)
            .map_err(|_| IngestError::InvalidInput("upload name cannot be empty".into()))?;

        let (reader, fallback_name): (Box<dyn Read + Send>, Option<String>) = match source {
            UploadSource::Path(path) => {
                let file = File::open(&path).map_err(|source| IngestError::UploadOpen {
                    path: path.clone(),
                    source,
                })?;
                let fallback = path.file_name().map(|n| n.to_string_lossy().into_owned());
                (Box::new(file), fallback)
            }
            UploadSource::Reader(reader) => (reader, None),
        };

        let spooled = self.store().spool(bucket, reader)?;
        // `.zip` or ZIP magic means Archive, except for ZIP-based documents (`.docx`,
        // `.xlsx`, ...), which stay single files.
        match detect_upload_kind(name.as_str(), spooled.head()) {
            UploadKind::PlainFile => {
                let extension = canonical_extension(name.as_str(), fallback_name.as_deref());
                let blob = self.store().commit(spooled, extension.as_deref())?;
                let row = self.record(NewStoredFile::new(*bucket, name.as_str(), blob))?;
                Ok(vec![row])
            }
            UploadKind::Archive => self.ingest_archive(bucket, name.as_str(), spooled),
        }
    }

    /// Expands a spooled archive and stores every member.
    ///
    /// Either all members end up recorded or none do: if one member fails, rows
    /// already created for this archive are discarded again.
    fn ingest_archive(
        &self,
        bucket: &Bucket,
        archive_name: &str,
        spooled: SpooledUpload,
    ) -> IngestResult<Vec<StoredFile>> {
        let bucket_dir = self.store().bucket_dir(bucket);
        let expanded = self.expander().expand(spooled.path(), &bucket_dir)?;
        drop(spooled);

        tracing::debug!(
            bucket = %bucket,
            archive = %archive_name,
            members = expanded.members().len(),
            "expanded archive"
        );

        let mut stored = Vec::with_capacity(expanded.members().len());
        let mut failure = None;
        for member in expanded.members() {
            let display_name = member_display_name(archive_name, &member.relative_path);
            match self.store_member(bucket, display_name, &member.path) {
                Ok(row) => stored.push(row),
                Err(source) => {
                    failure = Some(IngestError::ArchiveMember {
                        archive: archive_name.to_string(),
                        member: member.relative_path.clone(),
                        source: Box::new(source),
                    });
                    break;
                }
            }
        }
        expanded.cleanup();

        match failure {
            None => Ok(stored),
            Some(e) => {
                self.roll_back(&stored);
                Err(e)
            }
        }
    }

    fn store_member(
        &self,
        bucket: &Bucket,
        display_name: String,
        path: &Path,
    ) -> IngestResult<StoredFile> {
        let file = File::open(path).map_err(FilesError::from)?;
        let blob = self.store().put(bucket, &display_name, file)?;
        self.record(NewStoredFile::new(*bucket, display_name, blob))
    }

    fn roll_back(&self, rows: &[StoredFile]) {
        for row in rows.iter().rev() {
            if let Err(e) = self.discard_row(row) {
                tracing::warn!(id = %row.id, error = %e, "failed to roll back archive member");
            }
        }
    }

    /// Deletes one row if it belongs to `bucket`. Returns whether a row was removed.
    pub(crate) fn delete_one(&self, bucket: Bucket, id: FileId) -> IngestResult<bool> {
        match self.index().get(bucket.modality(), id)? {
            Some(row) if row.entity == bucket.entity() => {
                self.discard_row(&row)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
