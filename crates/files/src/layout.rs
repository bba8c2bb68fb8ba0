//! Bucket naming: the `{modality}/{entity_id}` directory scope of stored files.

use pfs_types::{EntityId, Modality};
use std::fmt;
use std::path::{Path, PathBuf};

/// Logical directory holding the files of one entity for one modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    modality: Modality,
    entity: EntityId,
}

impl Bucket {
    pub fn new(modality: Modality, entity: EntityId) -> Self {
        Self { modality, entity }
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Path relative to the storage root, e.g. `eeg/42`.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(self.modality.dir_name()).join(self.entity.to_string())
    }

    /// Directory of this bucket below `root`.
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }
}

/// Renders the logical bucket path recorded on metadata rows (`"eeg/42"`).
impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.modality.dir_name(), self.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_paths() {
        let bucket = Bucket::new(Modality::Seeg, EntityId::new(42));
        assert_eq!(bucket.to_string(), "seeg/42");
        assert_eq!(bucket.relative_path(), Path::new("seeg").join("42"));
        assert_eq!(
            bucket.dir_under(Path::new("/data")),
            Path::new("/data/seeg/42")
        );
    }

    #[test]
    fn report_exports_live_under_info() {
        let bucket = Bucket::new(Modality::ReportExport, EntityId::new(3));
        assert_eq!(bucket.to_string(), "info/3");
    }
}
