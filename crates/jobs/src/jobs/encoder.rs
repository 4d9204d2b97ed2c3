//! Encode/decode contract between typed job requests, persisted records, and tasks.
//!
//! ## Decode deletes first
//!
//! Every decoder removes the source record from the store before it reads a single
//! field. A record that fails to decode is therefore gone for good; the failure is
//! logged by the caller and never retried. A record that decodes but whose task has not
//! finished when the process dies is lost as well: durability only covers the window
//! between `create` and decode.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use comicshelf_core::{Comic, ComicId, DomainError};

use super::store::{JobStore, JobStoreError};
use super::task::Task;
use super::tasks::{
    AddComicParams, ConvertComicParams, DeleteComicParams, MoveComicParams, ProcessComicParams,
    RescanComicParams, UndeleteComicParams,
};
use super::types::{JobId, JobRecord, JobType};
use crate::library::{ComicLibrary, ComicLookup};

/// Parameter keys used in persisted records.
pub mod keys {
    pub const FILENAME: &str = "filename";
    pub const DELETE_BLOCKED_PAGES: &str = "delete_blocked_pages";
    pub const IGNORE_METADATA: &str = "ignore_metadata";
    pub const TARGET_ARCHIVE_TYPE: &str = "target_archive_type";
    pub const RENAME_PAGES: &str = "rename_pages";
    pub const DELETE_PAGES: &str = "delete_pages";
    pub const TARGET_DIRECTORY: &str = "target_directory";
    pub const RENAMING_RULE: &str = "renaming_rule";
    pub const DELETE_FILE: &str = "delete_file";
}

/// Typed input for one job, as built by producers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    AddComic(AddComicParams),
    ProcessComic(ProcessComicParams),
    ConvertComic(ConvertComicParams),
    MoveComic(MoveComicParams),
    DeleteComic(DeleteComicParams),
    RescanComic(RescanComicParams),
    UndeleteComic(UndeleteComicParams),
}

impl JobRequest {
    pub fn job_type(&self) -> JobType {
        match self {
            JobRequest::AddComic(_) => JobType::AddComic,
            JobRequest::ProcessComic(_) => JobType::ProcessComic,
            JobRequest::ConvertComic(_) => JobType::ConvertComic,
            JobRequest::MoveComic(_) => JobType::MoveComic,
            JobRequest::DeleteComic(_) => JobType::DeleteComic,
            JobRequest::RescanComic(_) => JobType::RescanComic,
            JobRequest::UndeleteComic(_) => JobType::UndeleteComic,
        }
    }
}

macro_rules! impl_request_from {
    ($($params:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$params> for JobRequest {
                fn from(value: $params) -> Self {
                    JobRequest::$variant(value)
                }
            }
        )*
    };
}

impl_request_from!(
    AddComicParams => AddComic,
    ProcessComicParams => ProcessComic,
    ConvertComicParams => ConvertComic,
    MoveComicParams => MoveComic,
    DeleteComicParams => DeleteComic,
    RescanComicParams => RescanComic,
    UndeleteComicParams => UndeleteComic,
);

/// Bidirectional mapping between one job type's records and its task.
pub trait JobEncoder: Send + Sync {
    fn job_type(&self) -> JobType;

    /// Build an unsaved record carrying everything `decode` needs. Does not persist.
    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError>;

    /// Delete the record from the store, then rebuild its task.
    fn decode(&self, record: &JobRecord) -> Result<Box<dyn Task>, DecodeError>;
}

/// Producer-side failure; nothing has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("{job_type} request is missing required parameter `{key}`")]
    MissingParameter { job_type: JobType, key: &'static str },

    #[error("{job_type} parameter `{key}` is not valid UTF-8")]
    NonUtf8Path { job_type: JobType, key: &'static str },

    #[error("{expected} encoder cannot encode a {actual} request")]
    WrongRequest { expected: JobType, actual: JobType },
}

impl EncodeError {
    pub fn wrong_request(expected: JobType, request: &JobRequest) -> Self {
        Self::WrongRequest {
            expected,
            actual: request.job_type(),
        }
    }
}

/// Fatal, per-job decode failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{job_type} job {job_id} is missing required parameter `{key}`")]
    MissingParameter {
        job_id: JobId,
        job_type: JobType,
        key: &'static str,
    },

    #[error("{job_type} job {job_id} has malformed parameter `{key}`: `{value}`")]
    MalformedParameter {
        job_id: JobId,
        job_type: JobType,
        key: &'static str,
        value: String,
    },

    #[error("{job_type} job {job_id} has no subject comic")]
    MissingSubject { job_id: JobId, job_type: JobType },

    #[error("comic {comic_id} referenced by job {job_id} does not exist")]
    SubjectNotFound { job_id: JobId, comic_id: ComicId },

    #[error("{expected} decoder received a {actual} record ({job_id})")]
    WrongJobType {
        job_id: JobId,
        expected: JobType,
        actual: JobType,
    },

    #[error("subject lookup failed: {0}")]
    Lookup(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Collaborators shared by every decoder.
#[derive(Clone)]
pub struct DecodeContext {
    store: Arc<dyn JobStore>,
    lookup: Arc<dyn ComicLookup>,
    library: Arc<dyn ComicLibrary>,
}

impl std::fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext")
            .field("store", &"<dyn JobStore>")
            .field("lookup", &"<dyn ComicLookup>")
            .field("library", &"<dyn ComicLibrary>")
            .finish()
    }
}

impl DecodeContext {
    pub fn new(
        store: Arc<dyn JobStore>,
        lookup: Arc<dyn ComicLookup>,
        library: Arc<dyn ComicLibrary>,
    ) -> Self {
        Self {
            store,
            lookup,
            library,
        }
    }

    pub fn library(&self) -> Arc<dyn ComicLibrary> {
        Arc::clone(&self.library)
    }

    /// Delete `record` from the store and return a reader over its fields.
    ///
    /// The type check happens before the delete; a mismatch means the wrong decoder was
    /// picked and the record is left alone.
    pub fn consume<'a>(
        &'a self,
        record: &'a JobRecord,
        expected: JobType,
    ) -> Result<RecordReader<'a>, DecodeError> {
        if record.job_type != expected {
            return Err(DecodeError::WrongJobType {
                job_id: record.id,
                expected,
                actual: record.job_type,
            });
        }

        self.store.delete(record.id)?;

        Ok(RecordReader {
            record,
            lookup: self.lookup.as_ref(),
        })
    }
}

/// Typed access to a consumed record's parameters.
pub struct RecordReader<'a> {
    record: &'a JobRecord,
    lookup: &'a dyn ComicLookup,
}

impl<'a> RecordReader<'a> {
    pub fn required(&self, key: &'static str) -> Result<&'a str, DecodeError> {
        self.record
            .param(key)
            .ok_or(DecodeError::MissingParameter {
                job_id: self.record.id,
                job_type: self.record.job_type,
                key,
            })
    }

    /// Non-blank path parameter.
    pub fn required_path(&self, key: &'static str) -> Result<PathBuf, DecodeError> {
        let raw = self.required(key)?;
        if raw.trim().is_empty() {
            return Err(self.malformed(key, raw));
        }
        Ok(PathBuf::from(raw))
    }

    /// Boolean stored as `true`/`false`.
    pub fn flag(&self, key: &'static str) -> Result<bool, DecodeError> {
        match self.required(key)? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.malformed(key, other)),
        }
    }

    pub fn parse<T: FromStr>(&self, key: &'static str) -> Result<T, DecodeError> {
        let raw = self.required(key)?;
        raw.parse().map_err(|_| self.malformed(key, raw))
    }

    /// Resolve the subject comic through the lookup collaborator.
    pub fn subject(&self) -> Result<Comic, DecodeError> {
        let comic_id = self.record.subject.ok_or(DecodeError::MissingSubject {
            job_id: self.record.id,
            job_type: self.record.job_type,
        })?;

        self.lookup
            .find_comic(comic_id)?
            .ok_or(DecodeError::SubjectNotFound {
                job_id: self.record.id,
                comic_id,
            })
    }

    fn malformed(&self, key: &'static str, value: &str) -> DecodeError {
        DecodeError::MalformedParameter {
            job_id: self.record.id,
            job_type: self.record.job_type,
            key,
            value: value.to_string(),
        }
    }
}

/// UTF-8 form of a path parameter; empty paths count as missing.
pub(crate) fn path_param<'p>(
    job_type: JobType,
    key: &'static str,
    path: &'p Path,
) -> Result<&'p str, EncodeError> {
    let value = path
        .to_str()
        .ok_or(EncodeError::NonUtf8Path { job_type, key })?;
    if value.trim().is_empty() {
        return Err(EncodeError::MissingParameter { job_type, key });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use crate::library::InMemoryComicCatalog;
    use crate::testing::RecordingLibrary;
    use comicshelf_core::ArchiveType;

    fn context(store: Arc<InMemoryJobStore>, catalog: InMemoryComicCatalog) -> DecodeContext {
        DecodeContext::new(store, Arc::new(catalog), Arc::new(RecordingLibrary::new()))
    }

    #[test]
    fn consume_deletes_before_reading() {
        let store = InMemoryJobStore::arc();
        let ctx = context(store.clone(), InMemoryComicCatalog::new());
        let record = JobRecord::new(JobType::RescanComic);
        store.create(&record).unwrap();

        let reader = ctx.consume(&record, JobType::RescanComic).unwrap();
        assert!(store.is_empty());

        // Subject missing, but the record is already gone.
        assert!(matches!(
            reader.subject(),
            Err(DecodeError::MissingSubject { .. })
        ));
    }

    #[test]
    fn consume_rejects_foreign_records_without_deleting() {
        let store = InMemoryJobStore::arc();
        let ctx = context(store.clone(), InMemoryComicCatalog::new());
        let record = JobRecord::new(JobType::MoveComic);
        store.create(&record).unwrap();

        let err = ctx.consume(&record, JobType::DeleteComic).err().unwrap();
        assert!(matches!(err, DecodeError::WrongJobType { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn consuming_twice_fails() {
        let store = InMemoryJobStore::arc();
        let ctx = context(store.clone(), InMemoryComicCatalog::new());
        let record = JobRecord::new(JobType::RescanComic);
        store.create(&record).unwrap();

        assert!(ctx.consume(&record, JobType::RescanComic).is_ok());
        let err = ctx.consume(&record, JobType::RescanComic).err().unwrap();
        assert_eq!(err, DecodeError::Store(JobStoreError::NotFound(record.id)));
    }

    #[test]
    fn reader_parses_typed_values() {
        let store = InMemoryJobStore::arc();
        let ctx = context(
            store.clone(),
            InMemoryComicCatalog::with_comics([Comic::new(
                ComicId::new(9),
                "/library/a.cbr",
                ArchiveType::Cbr,
            )]),
        );
        let record = JobRecord::new(JobType::ConvertComic)
            .with_subject(ComicId::new(9))
            .with_param(keys::TARGET_ARCHIVE_TYPE, "cb7")
            .with_param(keys::RENAME_PAGES, "true")
            .with_param(keys::DELETE_PAGES, "yes");
        store.create(&record).unwrap();

        let reader = ctx.consume(&record, JobType::ConvertComic).unwrap();
        assert_eq!(
            reader.parse::<ArchiveType>(keys::TARGET_ARCHIVE_TYPE).unwrap(),
            ArchiveType::Cb7
        );
        assert!(reader.flag(keys::RENAME_PAGES).unwrap());
        assert!(matches!(
            reader.flag(keys::DELETE_PAGES),
            Err(DecodeError::MalformedParameter { key: "delete_pages", .. })
        ));
        assert_eq!(reader.subject().unwrap().id, ComicId::new(9));
    }

    #[test]
    fn blank_paths_are_malformed() {
        let store = InMemoryJobStore::arc();
        let ctx = context(store.clone(), InMemoryComicCatalog::new());
        let record = JobRecord::new(JobType::AddComic).with_param(keys::FILENAME, " ");
        store.create(&record).unwrap();

        let reader = ctx.consume(&record, JobType::AddComic).unwrap();
        assert!(matches!(
            reader.required_path(keys::FILENAME),
            Err(DecodeError::MalformedParameter { key: "filename", .. })
        ));
        assert!(matches!(
            reader.required_path(keys::TARGET_DIRECTORY),
            Err(DecodeError::MissingParameter { key: "target_directory", .. })
        ));
    }

    #[test]
    fn unknown_subject_is_reported() {
        let store = InMemoryJobStore::arc();
        let ctx = context(store.clone(), InMemoryComicCatalog::new());
        let record = JobRecord::new(JobType::RescanComic).with_subject(ComicId::new(404));
        store.create(&record).unwrap();

        let reader = ctx.consume(&record, JobType::RescanComic).unwrap();
        assert_eq!(
            reader.subject().unwrap_err(),
            DecodeError::SubjectNotFound {
                job_id: record.id,
                comic_id: ComicId::new(404),
            }
        );
    }

    struct OfflineCatalog;

    impl ComicLookup for OfflineCatalog {
        fn find_comic(&self, _id: ComicId) -> comicshelf_core::DomainResult<Option<Comic>> {
            Err(DomainError::unavailable("catalog database offline"))
        }
    }

    #[test]
    fn lookup_failures_surface_as_decode_errors() {
        let store = InMemoryJobStore::arc();
        let ctx = DecodeContext::new(
            store.clone(),
            Arc::new(OfflineCatalog),
            Arc::new(RecordingLibrary::new()),
        );
        let record = JobRecord::new(JobType::RescanComic).with_subject(ComicId::new(1));
        store.create(&record).unwrap();

        let reader = ctx.consume(&record, JobType::RescanComic).unwrap();
        assert!(matches!(
            reader.subject(),
            Err(DecodeError::Lookup(DomainError::Unavailable(_)))
        ));
    }

    #[test]
    fn empty_paths_count_as_missing() {
        assert_eq!(
            path_param(JobType::AddComic, keys::FILENAME, Path::new("  ")),
            Err(EncodeError::MissingParameter {
                job_type: JobType::AddComic,
                key: keys::FILENAME,
            })
        );
        assert_eq!(
            path_param(JobType::AddComic, keys::FILENAME, Path::new("/in/a.cbz")),
            Ok("/in/a.cbz")
        );
    }
}
