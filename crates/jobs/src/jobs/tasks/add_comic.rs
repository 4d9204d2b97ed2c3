//! Import a new archive into the library.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use comicshelf_core::ArchiveType;

use crate::jobs::encoder::{
    DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest, keys, path_param,
};
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::{JobRecord, JobType};
use crate::library::{ComicLibrary, ImportOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddComicParams {
    pub filename: PathBuf,
    pub delete_blocked_pages: bool,
    pub ignore_metadata: bool,
}

impl AddComicParams {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            delete_blocked_pages: false,
            ignore_metadata: false,
        }
    }

    pub fn delete_blocked_pages(mut self, value: bool) -> Self {
        self.delete_blocked_pages = value;
        self
    }

    pub fn ignore_metadata(mut self, value: bool) -> Self {
        self.ignore_metadata = value;
        self
    }
}

pub struct AddComicTask {
    filename: PathBuf,
    options: ImportOptions,
    library: Arc<dyn ComicLibrary>,
}

impl AddComicTask {
    pub fn params(&self) -> AddComicParams {
        AddComicParams {
            filename: self.filename.clone(),
            delete_blocked_pages: self.options.delete_blocked_pages,
            ignore_metadata: self.options.ignore_metadata,
        }
    }
}

impl Task for AddComicTask {
    fn job_type(&self) -> JobType {
        JobType::AddComic
    }

    fn description(&self) -> String {
        format!("add comic {}", self.filename.display())
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        if !self.filename.is_file() {
            return Err(TaskError::MissingFile(self.filename));
        }
        if ArchiveType::from_path(&self.filename).is_none() {
            return Err(TaskError::UnsupportedArchive(self.filename));
        }

        let comic_id = self.library.import(&self.filename, self.options)?;
        info!(comic_id = %comic_id, filename = %self.filename.display(), "comic imported");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AddComicEncoder {
    ctx: DecodeContext,
}

impl AddComicEncoder {
    pub fn new(ctx: DecodeContext) -> Self {
        Self { ctx }
    }

    pub fn encode_params(&self, params: &AddComicParams) -> Result<JobRecord, EncodeError> {
        let filename = path_param(JobType::AddComic, keys::FILENAME, &params.filename)?;

        Ok(JobRecord::new(JobType::AddComic)
            .with_param(keys::FILENAME, filename)
            .with_param(keys::DELETE_BLOCKED_PAGES, params.delete_blocked_pages)
            .with_param(keys::IGNORE_METADATA, params.ignore_metadata))
    }

    pub fn decode_task(&self, record: &JobRecord) -> Result<AddComicTask, DecodeError> {
        let reader = self.ctx.consume(record, JobType::AddComic)?;

        Ok(AddComicTask {
            filename: reader.required_path(keys::FILENAME)?,
            options: ImportOptions {
                delete_blocked_pages: reader.flag(keys::DELETE_BLOCKED_PAGES)?,
                ignore_metadata: reader.flag(keys::IGNORE_METADATA)?,
            },
            library: self.ctx.library(),
        })
    }
}

impl JobEncoder for AddComicEncoder {
    fn job_type(&self) -> JobType {
        JobType::AddComic
    }

    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError> {
        match request {
            JobRequest::AddComic(params) => self.encode_params(params),
            other => Err(EncodeError::wrong_request(JobType::AddComic, other)),
        }
    }

    fn decode(&self, record: &JobRecord) -> Result<Box<dyn Task>, DecodeError> {
        Ok(Box::new(self.decode_task(record)?))
    }
}
