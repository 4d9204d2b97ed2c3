//! Comic records and archive formats.

use core::str::FromStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::ComicId;

/// Container format of a comic archive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// Zip container.
    Cbz,
    /// Rar container.
    Cbr,
    /// 7-Zip container.
    Cb7,
}

impl ArchiveType {
    pub const ALL: [ArchiveType; 3] = [ArchiveType::Cbz, ArchiveType::Cbr, ArchiveType::Cb7];

    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveType::Cbz => "cbz",
            ArchiveType::Cbr => "cbr",
            ArchiveType::Cb7 => "cb7",
        }
    }

    /// Detect the archive type from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl core::fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbz" => Ok(ArchiveType::Cbz),
            "cbr" => Ok(ArchiveType::Cbr),
            "cb7" => Ok(ArchiveType::Cb7),
            other => Err(DomainError::UnknownArchiveType(other.to_string())),
        }
    }
}

/// A comic known to the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comic {
    pub id: ComicId,
    /// Location of the archive on disk.
    pub filename: PathBuf,
    pub archive_type: ArchiveType,
    /// Set when the comic is marked for deletion but the record is still kept.
    pub deleted: bool,
}

impl Comic {
    pub fn new(id: ComicId, filename: impl Into<PathBuf>, archive_type: ArchiveType) -> Self {
        Self {
            id,
            filename: filename.into(),
            archive_type,
            deleted: false,
        }
    }

    pub fn marked_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}
