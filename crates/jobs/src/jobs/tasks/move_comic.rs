//! Relocate a comic's archive.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use comicshelf_core::{Comic, ComicId};

use crate::jobs::encoder::{
    DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest, keys, path_param,
};
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::{JobRecord, JobType};
use crate::library::ComicLibrary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveComicParams {
    pub comic_id: ComicId,
    pub target_directory: PathBuf,
    /// Naming template for the moved file; empty keeps the current name.
    pub renaming_rule: String,
}

impl MoveComicParams {
    pub fn new(comic_id: ComicId, target_directory: impl Into<PathBuf>) -> Self {
        Self {
            comic_id,
            target_directory: target_directory.into(),
            renaming_rule: String::new(),
        }
    }

    pub fn renaming_rule(mut self, rule: impl Into<String>) -> Self {
        self.renaming_rule = rule.into();
        self
    }
}

pub struct MoveComicTask {
    comic: Comic,
    target_directory: PathBuf,
    renaming_rule: String,
    library: Arc<dyn ComicLibrary>,
}

impl MoveComicTask {
    pub fn params(&self) -> MoveComicParams {
        MoveComicParams {
            comic_id: self.comic.id,
            target_directory: self.target_directory.clone(),
            renaming_rule: self.renaming_rule.clone(),
        }
    }
}

impl Task for MoveComicTask {
    fn job_type(&self) -> JobType {
        JobType::MoveComic
    }

    fn description(&self) -> String {
        format!(
            "move comic {} to {}",
            self.comic.id,
            self.target_directory.display()
        )
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        self.library
            .relocate(&self.comic, &self.target_directory, &self.renaming_rule)?;
        info!(
            comic_id = %self.comic.id,
            target_directory = %self.target_directory.display(),
            "comic moved"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MoveComicEncoder {
    ctx: DecodeContext,
}

impl MoveComicEncoder {
    pub fn new(ctx: DecodeContext) -> Self {
        Self { ctx }
    }

    pub fn encode_params(&self, params: &MoveComicParams) -> Result<JobRecord, EncodeError> {
        let target_directory = path_param(
            JobType::MoveComic,
            keys::TARGET_DIRECTORY,
            &params.target_directory,
        )?;

        Ok(JobRecord::new(JobType::MoveComic)
            .with_subject(params.comic_id)
            .with_param(keys::TARGET_DIRECTORY, target_directory)
            .with_param(keys::RENAMING_RULE, &params.renaming_rule))
    }

    pub fn decode_task(&self, record: &JobRecord) -> Result<MoveComicTask, DecodeError> {
        let reader = self.ctx.consume(record, JobType::MoveComic)?;

        let target_directory = reader.required_path(keys::TARGET_DIRECTORY)?;
        let renaming_rule = reader.required(keys::RENAMING_RULE)?.to_string();

        Ok(MoveComicTask {
            comic: reader.subject()?,
            target_directory,
            renaming_rule,
            library: self.ctx.library(),
        })
    }
}

impl JobEncoder for MoveComicEncoder {
    fn job_type(&self) -> JobType {
        JobType::MoveComic
    }

    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError> {
        match request {
            JobRequest::MoveComic(params) => self.encode_params(params),
            other => Err(EncodeError::wrong_request(JobType::MoveComic, other)),
        }
    }

    fn decode(&self, record: &JobRecord) -> Result<Box<dyn Task>, DecodeError> {
        Ok(Box::new(self.decode_task(record)?))
    }
}
