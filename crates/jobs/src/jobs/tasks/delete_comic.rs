//! Mark a comic deleted, optionally removing its archive.

use std::sync::Arc;

use tracing::info;

use comicshelf_core::{Comic, ComicId};

use crate::jobs::encoder::{DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest, keys};
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::{JobRecord, JobType};
use crate::library::ComicLibrary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteComicParams {
    pub comic_id: ComicId,
    /// Remove the archive from disk as well as marking the record.
    pub delete_file: bool,
}

impl DeleteComicParams {
    pub fn new(comic_id: ComicId, delete_file: bool) -> Self {
        Self {
            comic_id,
            delete_file,
        }
    }
}

pub struct DeleteComicTask {
    comic: Comic,
    delete_file: bool,
    library: Arc<dyn ComicLibrary>,
}

impl DeleteComicTask {
    pub fn params(&self) -> DeleteComicParams {
        DeleteComicParams {
            comic_id: self.comic.id,
            delete_file: self.delete_file,
        }
    }
}

impl Task for DeleteComicTask {
    fn job_type(&self) -> JobType {
        JobType::DeleteComic
    }

    fn description(&self) -> String {
        if self.delete_file {
            format!("delete comic {} and its file", self.comic.id)
        } else {
            format!("delete comic {}", self.comic.id)
        }
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        if self.comic.deleted && !self.delete_file {
            return Err(TaskError::conflict(self.comic.id, "already marked deleted"));
        }

        self.library.delete(&self.comic, self.delete_file)?;
        info!(comic_id = %self.comic.id, delete_file = self.delete_file, "comic deleted");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeleteComicEncoder {
    ctx: DecodeContext,
}

impl DeleteComicEncoder {
    pub fn new(ctx: DecodeContext) -> Self {
        Self { ctx }
    }

    pub fn encode_params(&self, params: &DeleteComicParams) -> Result<JobRecord, EncodeError> {
        Ok(JobRecord::new(JobType::DeleteComic)
            .with_subject(params.comic_id)
            .with_param(keys::DELETE_FILE, params.delete_file))
    }

    pub fn decode_task(&self, record: &JobRecord) -> Result<DeleteComicTask, DecodeError> {
        let reader = self.ctx.consume(record, JobType::DeleteComic)?;
        let delete_file = reader.flag(keys::DELETE_FILE)?;

        Ok(DeleteComicTask {
            comic: reader.subject()?,
            delete_file,
            library: self.ctx.library(),
        })
    }
}

impl JobEncoder for DeleteComicEncoder {
    fn job_type(&self) -> JobType {
        JobType::DeleteComic
    }

    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError> {
        match request {
            JobRequest::DeleteComic(params) => self.encode_params(params),
            other => Err(EncodeError::wrong_request(JobType::DeleteComic, other)),
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
    use crate::testing::Harness;

    #[test]
    fn round_trip_keeps_delete_file_flag() {
        let harness = Harness::new().with_comic(7);
        let encoder = DeleteComicEncoder::new(harness.context());

        for delete_file in [true, false] {
            let params = DeleteComicParams::new(ComicId::new(7), delete_file);
            let record = encoder.encode_params(&params).unwrap();
            harness.store.create(&record).unwrap();
            assert_eq!(encoder.decode_task(&record).unwrap().params(), params);
        }
    }

    #[test]
    fn deleting_a_deleted_comic_again_conflicts() {
        let harness = Harness::new().with_deleted_comic(8);
        let encoder = DeleteComicEncoder::new(harness.context());
        let record = encoder
            .encode_params(&DeleteComicParams::new(ComicId::new(8), false))
            .unwrap();
        harness.store.create(&record).unwrap();

        let result = encoder.decode(&record).unwrap().execute();
        assert!(matches!(result, Err(TaskError::Conflict { .. })));
        assert!(harness.library.calls().is_empty());
    }

    #[test]
    fn deleted_comic_can_still_lose_its_file() {
        let harness = Harness::new().with_deleted_comic(8);
        let encoder = DeleteComicEncoder::new(harness.context());
        let record = encoder
            .encode_params(&DeleteComicParams::new(ComicId::new(8), true))
            .unwrap();
        harness.store.create(&record).unwrap();

        encoder.decode(&record).unwrap().execute().unwrap();
        assert_eq!(harness.library.calls(), vec!["delete 8 true".to_string()]);
    }
}
