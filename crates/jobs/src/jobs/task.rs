//! Runnable form of a decoded job.

use std::path::PathBuf;

use comicshelf_core::ComicId;

use super::types::JobType;

/// A decoded, runnable unit of work.
///
/// Tasks only come out of a decoder and are owned by the worker from enqueue on.
/// `execute` consumes the task: one instance, one execution.
pub trait Task: Send {
    /// Job type this task was decoded from; keys the worker's pending counters.
    fn job_type(&self) -> JobType;

    /// Short human-readable summary for logs.
    fn description(&self) -> String;

    fn execute(self: Box<Self>) -> Result<(), TaskError>;
}

/// Business-level execution failure.
///
/// Caught by the worker loop, logged, and dropped. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("not a recognised comic archive: {}", .0.display())]
    UnsupportedArchive(PathBuf),

    #[error("comic {comic_id} is in a conflicting state: {reason}")]
    Conflict { comic_id: ComicId, reason: String },

    #[error("library operation failed: {0:#}")]
    Library(#[from] anyhow::Error),
}

impl TaskError {
    pub fn conflict(comic_id: ComicId, reason: impl Into<String>) -> Self {
        Self::Conflict {
            comic_id,
            reason: reason.into(),
        }
    }
}
