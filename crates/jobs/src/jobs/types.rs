//! Job records and the job type taxonomy.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comicshelf_core::ComicId;

/// Unique job identifier.
///
/// UUIDv7, so ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of deferred library work.
///
/// Closed set: every value needs a matching encoder registered at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Import a new archive file into the library.
    AddComic,
    /// Re-read an imported comic's archive (pages, embedded metadata).
    ProcessComic,
    /// Repack a comic into another archive format.
    ConvertComic,
    /// Relocate a comic's archive into a target directory.
    MoveComic,
    /// Mark a comic deleted, optionally removing its file.
    DeleteComic,
    /// Refresh a comic's details from its archive on disk.
    RescanComic,
    /// Clear a comic's deletion mark.
    UndeleteComic,
}

impl JobType {
    pub const ALL: [JobType; 7] = [
        JobType::AddComic,
        JobType::ProcessComic,
        JobType::ConvertComic,
        JobType::MoveComic,
        JobType::DeleteComic,
        JobType::RescanComic,
        JobType::UndeleteComic,
    ];

    /// Stable name used in durable storage.
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::AddComic => "add_comic",
            JobType::ProcessComic => "process_comic",
            JobType::ConvertComic => "convert_comic",
            JobType::MoveComic => "move_comic",
            JobType::DeleteComic => "delete_comic",
            JobType::RescanComic => "rescan_comic",
            JobType::UndeleteComic => "undelete_comic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable description of one deferred unit of work.
///
/// Parameters are flat string pairs; booleans are `true`/`false`, enums use their wire
/// names, paths their UTF-8 form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    /// Comic the job operates on, when there is one.
    pub subject: Option<ComicId>,
    pub parameters: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create an unsaved record with no parameters.
    pub fn new(job_type: JobType) -> Self {
        Self {
            id: JobId::new(),
            job_type,
            subject: None,
            parameters: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_subject(mut self, comic_id: ComicId) -> Self {
        self.subject = Some(comic_id);
        self
    }

    pub fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Drop a parameter. Used to build damaged records in tests and repair tooling.
    pub fn without_param(mut self, key: &str) -> Self {
        self.parameters.remove(key);
        self
    }
}
