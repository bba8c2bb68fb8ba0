//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the core
//! services. Services never read process-wide environment variables themselves, so
//! tests can point each service at an isolated temporary storage root.

use crate::constants::{DEFAULT_STORAGE_ROOT, INDEX_FILENAME};
use crate::{IngestError, IngestResult};
use pfs_files::ExtractionLimits;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_root: PathBuf,
    index_path: PathBuf,
    extraction_limits: ExtractionLimits,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// When `index_path` is `None` the index lives at `<storage_root>/stored_files.sqlite3`.
    pub fn new(
        storage_root: PathBuf,
        index_path: Option<PathBuf>,
        extraction_limits: ExtractionLimits,
    ) -> IngestResult<Self> {
        if storage_root.as_os_str().is_empty() {
            return Err(IngestError::InvalidInput(
                "storage_root cannot be empty".into(),
            ));
        }
        if extraction_limits.max_entries == 0 || extraction_limits.max_total_bytes == 0 {
            return Err(IngestError::InvalidInput(
                "extraction limits must be greater than zero".into(),
            ));
        }

        let index_path = index_path.unwrap_or_else(|| storage_root.join(INDEX_FILENAME));
        Ok(Self {
            storage_root,
            index_path,
            extraction_limits,
        })
    }

    /// Configuration rooted at `storage_root` with default index location and limits.
    pub fn with_root(storage_root: impl Into<PathBuf>) -> IngestResult<Self> {
        Self::new(storage_root.into(), None, ExtractionLimits::default())
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn extraction_limits(&self) -> ExtractionLimits {
        self.extraction_limits
    }
}

/// Resolve the storage root from an optional environment value.
///
/// `None` or a blank value falls back to [`DEFAULT_STORAGE_ROOT`].
pub fn storage_root_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT))
}

/// Resolve an optional path override; blank values count as absent.
pub fn optional_path_from_env_value(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Build extraction limits from optional environment values, keeping defaults for
/// anything unset.
pub fn extraction_limits_from_env_values(
    max_entries: Option<String>,
    max_total_bytes: Option<String>,
) -> IngestResult<ExtractionLimits> {
    fn parse<T: std::str::FromStr>(name: &str, value: Option<String>) -> IngestResult<Option<T>> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<T>().map_err(|_| {
                    IngestError::InvalidInput(format!("{name} must be a positive integer, got '{v}'"))
                })
            })
            .transpose()
    }

    let defaults = ExtractionLimits::default();
    Ok(ExtractionLimits {
        max_entries: parse("max archive entries", max_entries)?.unwrap_or(defaults.max_entries),
        max_total_bytes: parse("max extracted bytes", max_total_bytes)?
            .unwrap_or(defaults.max_total_bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_defaults_to_storage_root() {
        let cfg = CoreConfig::with_root("/srv/files").unwrap();
        assert_eq!(cfg.index_path(), Path::new("/srv/files").join(INDEX_FILENAME));
        assert_eq!(cfg.extraction_limits(), ExtractionLimits::default());
    }

    #[test]
    fn explicit_index_path_wins() {
        let cfg = CoreConfig::new(
            PathBuf::from("/srv/files"),
            Some(PathBuf::from("/var/lib/pfs/index.sqlite3")),
            ExtractionLimits::default(),
        )
        .unwrap();
        assert_eq!(cfg.index_path(), Path::new("/var/lib/pfs/index.sqlite3"));
    }

    #[test]
    fn rejects_empty_root_and_zero_limits() {
        assert!(CoreConfig::with_root("").is_err());
        let zero = ExtractionLimits {
            max_entries: 0,
            ..ExtractionLimits::default()
        };
        assert!(CoreConfig::new(PathBuf::from("x"), None, zero).is_err());
    }

    #[test]
    fn storage_root_env_value() {
        assert_eq!(
            storage_root_from_env_value(None),
            PathBuf::from(DEFAULT_STORAGE_ROOT)
        );
        assert_eq!(
            storage_root_from_env_value(Some("  ".into())),
            PathBuf::from(DEFAULT_STORAGE_ROOT)
        );
        assert_eq!(
            storage_root_from_env_value(Some(" /data ".into())),
            PathBuf::from("/data")
        );
    }

    #[test]
    fn extraction_limits_env_values() {
        let limits = extraction_limits_from_env_values(Some("12".into()), None).unwrap();
        assert_eq!(limits.max_entries, 12);
        assert_eq!(
            limits.max_total_bytes,
            ExtractionLimits::default().max_total_bytes
        );

        assert!(extraction_limits_from_env_values(Some("many".into()), None).is_err());
    }
}
