//! Clear a comic's deleted mark.

use std::sync::Arc;

use tracing::info;

use comicshelf_core::{Comic, ComicId};

use crate::jobs::encoder::{DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest};
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::{JobRecord, JobType};
use crate::library::ComicLibrary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeleteComicParams {
    pub comic_id: ComicId,
}

impl UndeleteComicParams {
    pub fn new(comic_id: ComicId) -> Self {
        Self { comic_id }
    }
}

pub struct UndeleteComicTask {
    comic: Comic,
    library: Arc<dyn ComicLibrary>,
}

impl UndeleteComicTask {
    pub fn params(&self) -> UndeleteComicParams {
        UndeleteComicParams::new(self.comic.id)
    }
}

impl Task for UndeleteComicTask {
    fn job_type(&self) -> JobType {
        JobType::UndeleteComic
    }

    fn description(&self) -> String {
        format!("undelete comic {}", self.comic.id)
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        if !self.comic.deleted {
            return Err(TaskError::conflict(self.comic.id, "not marked deleted"));
        }

        self.library.undelete(&self.comic)?;
        info!(comic_id = %self.comic.id, "comic restored");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UndeleteComicEncoder {
    ctx: DecodeContext,
}

impl UndeleteComicEncoder {
    pub fn new(ctx: DecodeContext) -> Self {
        Self { ctx }
    }

    pub fn encode_params(&self, params: &UndeleteComicParams) -> Result<JobRecord, EncodeError> {
        Ok(JobRecord::new(JobType::UndeleteComic).with_subject(params.comic_id))
    }

    pub fn decode_task(&self, record: &JobRecord) -> Result<UndeleteComicTask, DecodeError> {
        let reader = self.ctx.consume(record, JobType::UndeleteComic)?;

        Ok(UndeleteComicTask {
            comic: reader.subject()?,
            library: self.ctx.library(),
        })
    }
}

impl JobEncoder for UndeleteComicEncoder {
    fn job_type(&self) -> JobType {
        JobType::UndeleteComic
    }

    fn encode(&self, request: &JobRequest) -> Result<JobRecord, EncodeError> {
        match request {
            JobRequest::UndeleteComic(params) => self.encode_params(params),
            other => Err(EncodeError::wrong_request(JobType::UndeleteComic, other)),
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
    fn deleted_comic_is_restored() {
        let harness = Harness::new().with_deleted_comic(21);
        let encoder = UndeleteComicEncoder::new(harness.context());
        let params = UndeleteComicParams::new(ComicId::new(21));
        let record = encoder.encode_params(&params).unwrap();
        harness.store.create(&record).unwrap();

        let task = encoder.decode_task(&record).unwrap();
        assert_eq!(task.params(), params);
        Box::new(task).execute().unwrap();
        assert_eq!(harness.library.calls(), vec!["undelete 21".to_string()]);
    }

    #[test]
    fn live_comic_conflicts() {
        let harness = Harness::new().with_comic(21);
        let encoder = UndeleteComicEncoder::new(harness.context());
        let record = encoder
            .encode_params(&UndeleteComicParams::new(ComicId::new(21)))
            .unwrap();
        harness.store.create(&record).unwrap();

        let result = encoder.decode(&record).unwrap().execute();
        assert!(matches!(
            result,
            Err(TaskError::Conflict { comic_id, .. }) if comic_id == ComicId::new(21)
        ));
        assert!(harness.library.calls().is_empty());
    }
}
