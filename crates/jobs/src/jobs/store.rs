//! Durable storage for job records.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::types::{JobId, JobRecord, JobType};

/// Job record store abstraction.
///
/// Records live here from submission until a decoder consumes them. Anything still
/// present at process start is recovered by the manager's sweep.
pub trait JobStore: Send + Sync {
    /// Persist a new record.
    fn create(&self, record: &JobRecord) -> Result<(), JobStoreError>;

    /// Every record not yet decoded, oldest first.
    fn find_all_pending(&self) -> Result<Vec<JobRecord>, JobStoreError>;

    /// Remove a record. Fails with `NotFound` if it was already consumed.
    fn delete(&self, id: JobId) -> Result<(), JobStoreError>;

    /// Number of undecoded records of one type.
    fn count_pending(&self, job_type: JobType) -> Result<usize, JobStoreError> {
        Ok(self
            .find_all_pending()?
            .iter()
            .filter(|r| r.job_type == job_type)
            .count())
    }
}

impl std::fmt::Debug for dyn JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn JobStore>")
    }
}

/// Job store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("corrupt job record: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory job store for tests/dev.
///
/// Nothing survives a restart, so recovery against it only sees records created by the
/// current process.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.id) {
            return Err(JobStoreError::AlreadyExists(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn find_all_pending(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<_> = records.values().cloned().collect();
        result.sort_by_key(|r| (r.created_at, r.id));
        Ok(result)
    }

    fn delete(&self, id: JobId) -> Result<(), JobStoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records
            .remove(&id)
            .map(|_| ())
            .ok_or(JobStoreError::NotFound(id))
    }

    fn count_pending(&self, job_type: JobType) -> Result<usize, JobStoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().filter(|r| r.job_type == job_type).count())
    }
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn create(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        (**self).create(record)
    }

    fn find_all_pending(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        (**self).find_all_pending()
    }

    fn delete(&self, id: JobId) -> Result<(), JobStoreError> {
        (**self).delete(id)
    }

    fn count_pending(&self, job_type: JobType) -> Result<usize, JobStoreError> {
        (**self).count_pending(job_type)
    }
}
