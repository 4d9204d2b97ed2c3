//! Re-read an imported comic's archive.

use std::sync::Arc;

use tracing::debug;

use comicshelf_core::{Comic, ComicId};

use crate::jobs::encoder::{DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest, keys};
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::{JobRecord, JobType};
use crate::library::{ComicLibrary, ImportOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessComicParams {
    pub comic_id: ComicId,
    pub delete_blocked_pages: bool,
    pub ignore_metadata: bool,
}

impl ProcessComicParams {
    pub fn new(comic_id: ComicId) -> Self {
        Self {
            comic_id,
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

pub struct ProcessComicTask {
    comic: Comic,
    options: ImportOptions,
    library: Arc<dyn ComicLibrary>,
}

impl ProcessComicTask {
    pub fn comic(&self) -> &Comic {
        &self.comic
    }

    pub fn params(&self) -> ProcessComicParams {
        ProcessComicParams {
            comic_id: self.comic.id,
            delete_blocked_pages: self.options.delete_blocked_pages,
            ignore_metadata: self.options.ignore_metadata,
        }
    }
}

impl Task for ProcessComicTask {
    fn job_type(&self) -> JobType {
        JobType::ProcessComic
    }

    fn description(&self) -> String {
        format!("process comic {}", self.comic.id)
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        self.library.process(&self.comic, self.options)?;
        debug!(comic_id = %self.comic.id, "comic processed");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessComicEncoder {
    ctx: DecodeContext,
}

impl ProcessComicEncoder {
    pub fn new(ctx: DecodeContext) -> Self {
        Self { ctx }
    }

    pub fn encode_params(&self, params: &ProcessComicParams) -> Result<JobRecord, EncodeError> {
        Ok(JobRecord::new(JobType::ProcessComic)
            .with_subject(params.comic_id)
            .with_param(keys::DELETE_BLOCKED_PAGES, params.delete_blocked_pages)
            .with_param(keys::IGNORE_METADATA, params.ignore_metadata))
    }

    pub fn decode_task(&self, record: &JobRecord) -> Result<ProcessComicTask, DecodeError> {
        let reader = self.ctx.consume(record, JobType::ProcessComic)?;

        let options = ImportOptions {
            delete_blocked_pages: reader.flag(keys::DELETE_BLOCKED_PAGES)?,
            ignore_metadata: reader.flag(keys::IGNORE_METADATA)?,
        };

        Ok(ProcessComicTask {
            comic: reader.subject()?,
            options,
            library: self.ctx.library(),
        })
    }
}

impl JobEncoder for ProcessComicEncoder {
    fn job_type(&self) -> JobType {
        JobType::ProcessComic
    }

    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError> {
        match request {
            JobRequest::ProcessComic(params) => self.encode_params(params),
            other => Err(EncodeError::wrong_request(JobType::ProcessComic, other)),
        }
    }

    fn decode(&self, record: &JobRecord) -> Result<Box<dyn Task>, DecodeError> {
        Ok(Box::new(self.decode_task(record)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::JobStore;
    use crate::jobs::tasks::RescanComicParams;
    use crate::testing::Harness;

    #[test]
    fn round_trip_resolves_subject() {
        let harness = Harness::new().with_comic(7);
        let encoder = ProcessComicEncoder::new(harness.context());
        let params = ProcessComicParams::new(ComicId::new(7)).ignore_metadata(true);

        let record = encoder.encode_params(&params).unwrap();
        harness.store.create(&record).unwrap();
        let task = encoder.decode_task(&record).unwrap();

        assert_eq!(task.params(), params);
        assert_eq!(task.comic().filename, harness.comic(7).filename);
    }

    #[test]
    fn missing_flag_fails_decode() {
        let harness = Harness::new().with_comic(7);
        let encoder = ProcessComicEncoder::new(harness.context());
        let record = encoder
            .encode_params(&ProcessComicParams::new(ComicId::new(7)))
            .unwrap()
            .without_param(keys::IGNORE_METADATA);
        harness.store.create(&record).unwrap();

        assert!(matches!(
            encoder.decode_task(&record),
            Err(DecodeError::MissingParameter { key: "ignore_metadata", .. })
        ));
        assert!(harness.store.is_empty());
    }

    #[test]
    fn foreign_request_is_rejected() {
        let harness = Harness::new();
        let encoder = ProcessComicEncoder::new(harness.context());
        let request = JobRequest::from(RescanComicParams::new(ComicId::new(1)));

        assert_eq!(
            encoder.encode(&request).unwrap_err(),
            EncodeError::WrongRequest {
                expected: JobType::ProcessComic,
                actual: JobType::RescanComic,
            }
        );
    }

    #[test]
    fn execute_delegates_to_library() {
        let harness = Harness::new().with_comic(7);
        let encoder = ProcessComicEncoder::new(harness.context());
        let record = encoder
            .encode_params(&ProcessComicParams::new(ComicId::new(7)))
            .unwrap();
        harness.store.create(&record).unwrap();

        encoder.decode(&record).unwrap().execute().unwrap();
        assert_eq!(harness.library.calls(), vec!["process 7".to_string()]);
    }
}
