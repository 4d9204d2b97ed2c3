//! Refresh a comic's metadata from its archive.

use std::sync::Arc;

use tracing::debug;

use comicshelf_core::{Comic, ComicId};

use crate::jobs::encoder::{DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest};
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::{JobRecord, JobType};
use crate::library::ComicLibrary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescanComicParams {
    pub comic_id: ComicId,
}

impl RescanComicParams {
    pub fn new(comic_id: ComicId) -> Self {
        Self { comic_id }
    }
}

pub struct RescanComicTask {
    comic: Comic,
    library: Arc<dyn ComicLibrary>,
}

impl RescanComicTask {
    pub fn params(&self) -> RescanComicParams {
        RescanComicParams::new(self.comic.id)
    }
}

impl Task for RescanComicTask {
    fn job_type(&self) -> JobType {
        JobType::RescanComic
    }

    fn description(&self) -> String {
        format!("rescan comic {}", self.comic.id)
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        self.library.rescan(&self.comic)?;
        debug!(comic_id = %self.comic.id, "comic rescanned");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RescanComicEncoder {
    ctx: DecodeContext,
}

impl RescanComicEncoder {
    pub fn new(ctx: DecodeContext) -> Self {
        Self { ctx }
    }

    pub fn encode_params(&self, params: &RescanComicParams) -> Result<JobRecord, EncodeError> {
        Ok(JobRecord::new(JobType::RescanComic).with_subject(params.comic_id))
    }

    pub fn decode_task(&self, record: &JobRecord) -> Result<RescanComicTask, DecodeError> {
        let reader = self.ctx.consume(record, JobType::RescanComic)?;

        Ok(RescanComicTask {
            comic: reader.subject()?,
            library: self.ctx.library(),
        })
    }
}

impl JobEncoder for RescanComicEncoder {
    fn job_type(&self) -> JobType {
        JobType::RescanComic
    }

    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError> {
        match request {
            JobRequest::RescanComic(params) => self.encode_params(params),
            other => Err(EncodeError::wrong_request(JobType::RescanComic, other)),
        }
    }

    fn decode(&self, record: &JobRecord) -> Result<Box<dyn Task>, DecodeError> {
        Ok(Box::new(self.decode_task(record)?))
    }
}
