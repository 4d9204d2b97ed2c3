//! Repack a comic into another archive format.

use std::sync::Arc;

use tracing::{debug, info};

use comicshelf_core::{ArchiveType, Comic, ComicId};

use crate::jobs::encoder::{DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest, keys};
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::{JobRecord, JobType};
use crate::library::{ComicLibrary, ConvertOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertComicParams {
    pub comic_id: ComicId,
    pub target_archive_type: ArchiveType,
    pub rename_pages: bool,
    pub delete_pages: bool,
}

impl ConvertComicParams {
    pub fn new(comic_id: ComicId, target_archive_type: ArchiveType) -> Self {
        Self {
            comic_id,
            target_archive_type,
            rename_pages: false,
            delete_pages: false,
        }
    }

    pub fn rename_pages(mut self, value: bool) -> Self {
        self.rename_pages = value;
        self
    }

    pub fn delete_pages(mut self, value: bool) -> Self {
        self.delete_pages = value;
        self
    }
}

pub struct ConvertComicTask {
    comic: Comic,
    target: ArchiveType,
    options: ConvertOptions,
    library: Arc<dyn ComicLibrary>,
}

impl ConvertComicTask {
    pub fn params(&self) -> ConvertComicParams {
        ConvertComicParams {
            comic_id: self.comic.id,
            target_archive_type: self.target,
            rename_pages: self.options.rename_pages,
            delete_pages: self.options.delete_pages,
        }
    }

    /// Same format and no page changes: repacking would produce the same archive.
    fn is_noop(&self) -> bool {
        self.comic.archive_type == self.target
            && !self.options.rename_pages
            && !self.options.delete_pages
    }
}

impl Task for ConvertComicTask {
    fn job_type(&self) -> JobType {
        JobType::ConvertComic
    }

    fn description(&self) -> String {
        format!(
            "convert comic {} from {} to {}",
            self.comic.id, self.comic.archive_type, self.target
        )
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        if self.is_noop() {
            debug!(
                comic_id = %self.comic.id,
                archive_type = %self.target,
                "comic already in target format"
            );
            return Ok(());
        }

        self.library.convert(&self.comic, self.target, self.options)?;
        info!(comic_id = %self.comic.id, archive_type = %self.target, "comic converted");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConvertComicEncoder {
    ctx: DecodeContext,
}

impl ConvertComicEncoder {
    pub fn new(ctx: DecodeContext) -> Self {
        Self { ctx }
    }

    pub fn encode_params(&self, params: &ConvertComicParams) -> Result<JobRecord, EncodeError> {
        Ok(JobRecord::new(JobType::ConvertComic)
            .with_subject(params.comic_id)
            .with_param(keys::TARGET_ARCHIVE_TYPE, params.target_archive_type)
            .with_param(keys::RENAME_PAGES, params.rename_pages)
            .with_param(keys::DELETE_PAGES, params.delete_pages))
    }

    pub fn decode_task(&self, record: &JobRecord) -> Result<ConvertComicTask, DecodeError> {
        let reader = self.ctx.consume(record, JobType::ConvertComic)?;

        let target = reader.parse::<ArchiveType>(keys::TARGET_ARCHIVE_TYPE)?;
        let options = ConvertOptions {
            rename_pages: reader.flag(keys::RENAME_PAGES)?,
            delete_pages: reader.flag(keys::DELETE_PAGES)?,
        };

        Ok(ConvertComicTask {
            comic: reader.subject()?,
            target,
            options,
            library: self.ctx.library(),
        })
    }
}

impl JobEncoder for ConvertComicEncoder {
    fn job_type(&self) -> JobType {
        JobType::ConvertComic
    }

    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError> {
        match request {
            JobRequest::ConvertComic(params) => self.encode_params(params),
            other => Err(EncodeError::wrong_request(JobType::ConvertComic, other)),
        }
    }

    fn decode(&self, record: &JobRecord) -> Result<Box<dyn Task>, DecodeError> {
        Ok(Box::new(self.decode_task(record)?))
    }
}
