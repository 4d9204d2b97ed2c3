//! Bridges durable job records and the in-memory worker queue.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::encoder::{DecodeError, EncodeError, JobRequest};
use super::registry::EncoderRegistry;
use super::store::{JobStore, JobStoreError};
use super::types::{JobId, JobType};
use super::worker::Worker;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("no encoder registered for {0}")]
    Unregistered(JobType),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("failed to persist job: {0}")]
    Store(#[from] JobStoreError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Outcome of a startup recovery sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RecoveryReport {
    /// Decoded and queued.
    pub recovered: usize,
    /// Decode failed; the record is gone.
    pub failed: usize,
    /// No encoder for the record's type; left in the store.
    pub skipped: usize,
}

/// Producer-facing entry point of the job engine.
#[derive(Debug, Clone)]
pub struct JobManager {
    store: Arc<dyn JobStore>,
    registry: Arc<EncoderRegistry>,
    worker: Arc<Worker>,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<EncoderRegistry>,
        worker: Arc<Worker>,
    ) -> Self {
        Self {
            store,
            registry,
            worker,
        }
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    /// Encode, persist, decode and enqueue one job.
    ///
    /// The record only lives in the store between `create` and decode; once this
    /// returns `Ok` the task is in the worker's queue and nothing is durable.
    pub fn submit(&self, request: impl Into<JobRequest>) -> Result<JobId, SubmitError> {
        let request = request.into();
        let job_type = request.job_type();
        let encoder = self
            .registry
            .get(job_type)
            .ok_or(SubmitError::Unregistered(job_type))?;

        let record = encoder.encode(&request)?;
        self.store.create(&record)?;
        debug!(job_id = %record.id, job_type = %job_type, "job accepted");

        let task = encoder.decode(&record).map_err(|err| {
            error!(job_id = %record.id, job_type = %job_type, error = %err, "job decode failed");
            err
        })?;

        self.worker.enqueue(task);
        Ok(record.id)
    }

    /// Queued tasks plus undecoded records of `job_type`.
    pub fn pending_count(&self, job_type: JobType) -> Result<usize, JobStoreError> {
        let stored = self.store.count_pending(job_type)?;
        Ok(self.worker.count_pending(job_type) + stored)
    }

    /// Decode and enqueue every record left in the store, oldest first.
    ///
    /// Run once at process start, before producers submit new work.
    pub fn recovery_sweep(&self) -> Result<RecoveryReport, JobStoreError> {
        let records = self.store.find_all_pending()?;
        let mut report = RecoveryReport::default();

        for record in records {
            let Some(encoder) = self.registry.get(record.job_type) else {
                warn!(
                    job_id = %record.id,
                    job_type = %record.job_type,
                    "no encoder for recovered job; leaving it in the store"
                );
                report.skipped += 1;
                continue;
            };

            match encoder.decode(&record) {
                Ok(task) => {
                    self.worker.enqueue(task);
                    report.recovered += 1;
                }
                Err(err) => {
                    error!(
                        job_id = %record.id,
                        job_type = %record.job_type,
                        error = %err,
                        "recovered job decode failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            recovered = report.recovered,
            failed = report.failed,
            skipped = report.skipped,
            "job recovery finished"
        );
        Ok(report)
    }
}
