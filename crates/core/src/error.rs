use pfs_types::{FileId, Modality};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Files(#[from] pfs_files::FilesError),
    #[error("failed to open upload {path}: {source}", path = path.display())]
    UploadOpen {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("modality {0} does not accept uploads")]
    UploadNotAccepted(Modality),
    #[error("archive {archive}: member {member} could not be stored: {source}")]
    ArchiveMember {
        archive: String,
        member: String,
        #[source]
        source: Box<IngestError>,
    },

    #[error("no {modality} file with id {id}")]
    NotFound { modality: Modality, id: FileId },
    #[error("stored file missing on disk: {path}", path = path.display())]
    FileMissing { path: std::path::PathBuf },
    #[error("integrity check failed for file {id}: expected sha256 {expected}, found {actual}")]
    IntegrityMismatch {
        id: FileId,
        expected: String,
        actual: String,
    },

    #[error("failed to prepare metadata index location: {0}")]
    IndexLocation(std::io::Error),
    #[error("failed to start metadata index runtime: {0}")]
    IndexRuntime(std::io::Error),
    #[error("metadata index database error: {0}")]
    IndexDatabase(#[from] sqlx::Error),
    #[error("metadata index holds an invalid row: {0}")]
    IndexCorrupt(String),
    #[error("metadata index lock poisoned")]
    IndexPoisoned,
}

impl IngestError {
    /// True when the failure is a security violation (archive path traversal).
    pub fn is_security_violation(&self) -> bool {
        match self {
            IngestError::Files(e) => e.is_security_violation(),
            IngestError::ArchiveMember { source, .. } => source.is_security_violation(),
            _ => false,
        }
    }

    /// True for the 404-class retrieval failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IngestError::NotFound { .. } | IngestError::FileMissing { .. }
        )
    }
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
