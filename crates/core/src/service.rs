//! File service: the entry point tying the store, the archive expander and the
//! metadata index together.
//!
//! The operations live in sibling modules (`ingest`, `resolve`, `lifecycle`,
//! `reports`), each adding an `impl` block to [`FileService`].

use crate::index::{FileIndex, NewStoredFile, StoredFile};
use crate::{CoreConfig, IngestResult};
use pfs_files::{ContentStore, SafeArchiveExpander};
use std::sync::Arc;

/// Patient file operations over one storage root and one metadata index.
#[derive(Debug)]
pub struct FileService<I> {
    cfg: Arc<CoreConfig>,
    store: ContentStore,
    expander: SafeArchiveExpander,
    index: I,
}

impl<I: FileIndex> FileService<I> {
    /// Creates a service rooted at the configured storage root.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::Files` if the storage root cannot be created or is not a
    /// directory.
    pub fn new(cfg: Arc<CoreConfig>, index: I) -> IngestResult<Self> {
        let store = ContentStore::new(cfg.storage_root())?;
        let expander = SafeArchiveExpander::new(cfg.extraction_limits());
        Ok(Self {
            cfg,
            store,
            expander,
            index,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub(crate) fn expander(&self) -> &SafeArchiveExpander {
        &self.expander
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Inserts a row for a freshly committed blob.
    ///
    /// If the insert fails, the blob is removed again unless another row already
    /// references it.
    pub(crate) fn record(&self, new: NewStoredFile) -> IngestResult<StoredFile> {
        let bucket = new.bucket().to_string();
        let name = new.canonical_name().to_string();

        match self.index.insert(new) {
            Ok(row) => {
                tracing::info!(
                    id = %row.id,
                    bucket = %row.bucket,
                    name = %row.canonical_name,
                    display_name = %row.display_name,
                    "stored file"
                );
                Ok(row)
            }
            Err(e) => {
                if matches!(self.index.reference_count(&bucket, &name), Ok(0)) {
                    if let Err(remove_err) = self.store.remove(&bucket, &name) {
                        tracing::warn!(
                            bucket = %bucket,
                            name = %name,
                            error = %remove_err,
                            "failed to remove unrecorded file"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Removes a row, physical file first (best effort), then the row itself.
    ///
    /// The physical file is kept while another row still references the same
    /// `(bucket, canonical name)`, so every remaining row keeps resolving to an
    /// existing file.
    pub(crate) fn discard_row(&self, row: &StoredFile) -> IngestResult<()> {
        let references = self
            .index
            .reference_count(&row.bucket, &row.canonical_name)?;

        if references > 1 {
            tracing::debug!(
                id = %row.id,
                bucket = %row.bucket,
                name = %row.canonical_name,
                references,
                "physical file still referenced, keeping it"
            );
        } else {
            match self.store.remove(&row.bucket, &row.canonical_name) {
                Ok(true) => {}
                Ok(false) => tracing::debug!(
                    id = %row.id,
                    bucket = %row.bucket,
                    name = %row.canonical_name,
                    "physical file already missing"
                ),
                Err(e) => tracing::warn!(
                    id = %row.id,
                    bucket = %row.bucket,
                    name = %row.canonical_name,
                    error = %e,
                    "failed to remove physical file, removing row anyway"
                ),
            }
        }

        self.index.remove(row.id)?;
        tracing::info!(id = %row.id, bucket = %row.bucket, "deleted stored file");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pfs_files::Bucket;
    use pfs_types::{EntityId, Modality};

    #[test]
    fn new_creates_storage_root() {
        let (temp, service) = service();
        assert!(temp.path().join("large_files").is_dir());
        assert!(service.store().root().is_absolute());
    }

    #[test]
    fn discard_keeps_shared_physical_file() {
        let (_temp, service) = service();
        let bucket = Bucket::new(Modality::Pet, EntityId::new(3));

        let blob = service.store().put(&bucket, "a.dcm", &b"same"[..]).unwrap();
        let first = service
            .record(NewStoredFile::new(bucket, "a.dcm", blob.clone()))
            .unwrap();
        let second = service
            .record(NewStoredFile::new(bucket, "b.dcm", blob.clone()))
            .unwrap();

        service.discard_row(&first).unwrap();
        assert_eq!(listing(&service, &bucket), vec![blob.canonical_name.clone()]);

        service.discard_row(&second).unwrap();
        assert!(listing(&service, &bucket).is_empty());
        assert!(service.index().list_entity(EntityId::new(3)).unwrap().is_empty());
    }
}
