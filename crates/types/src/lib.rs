//! Shared value types for the patient file store.
//!
//! These types are used by every crate in the workspace so that identifiers and
//! modality tags are validated once, at the boundary, and can be trusted afterwards.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// Errors that can occur when parsing identifiers and tags.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("invalid numeric identifier: '{0}'")]
    InvalidId(String),
    #[error("unknown modality: '{0}'")]
    UnknownModality(String),
    #[error("unknown report format: '{0}'")]
    UnknownReportFormat(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| IdError::InvalidId(s.to_string()))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of the entity (patient) that owns stored files.
    EntityId
);

numeric_id!(
    /// Identifier of a stored-file metadata row.
    FileId
);

/// The fixed categories of file collection belonging to an entity.
///
/// The string form of each variant is also its directory name under the storage root,
/// so it is part of the on-disk contract and must not change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Magnetic resonance imaging.
    Mri,
    /// Positron emission tomography.
    Pet,
    /// Scalp electroencephalography.
    Eeg,
    /// Stereo-electroencephalography.
    Seeg,
    /// Generated patient report exports.
    #[serde(rename = "info")]
    ReportExport,
}

impl Modality {
    /// Every modality, in directory order.
    pub const ALL: [Modality; 5] = [
        Modality::Mri,
        Modality::Pet,
        Modality::Eeg,
        Modality::Seeg,
        Modality::ReportExport,
    ];

    /// Directory name of this modality under the storage root.
    pub const fn dir_name(self) -> &'static str {
        match self {
            Modality::Mri => "mri",
            Modality::Pet => "pet",
            Modality::Eeg => "eeg",
            Modality::Seeg => "seeg",
            Modality::ReportExport => "info",
        }
    }

    pub const fn accepts_uploads(self) -> bool {
        !matches!(self, Modality::ReportExport)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Modality {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Modality::ALL
            .into_iter()
            .find(|m| m.dir_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| IdError::UnknownModality(s.to_string()))
    }
}

/// Output formats of the report exporter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Tabular export.
    Csv,
    /// Rich-document export.
    Word,
    /// Paginated-document export.
    Pdf,
}

impl ReportFormat {
    /// File extension (without the dot) used for stored exports of this format.
    pub const fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Word => "docx",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Word => "word",
            ReportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "word" | "docx" => Ok(ReportFormat::Word),
            "pdf" => Ok(ReportFormat::Pdf),
            _ => Err(IdError::UnknownReportFormat(s.to_string())),
        }
    }
}
