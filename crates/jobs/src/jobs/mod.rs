//! Deferred comic-library work: records, encoders, tasks and the worker that runs them.
//!
//! ## Flow
//!
//! - A producer builds a typed [`JobRequest`] and hands it to [`JobManager::submit`]
//! - The matching [`JobEncoder`] turns it into a [`JobRecord`], which is persisted
//! - The record is decoded straight away (deleting it) into a [`Task`]
//! - The [`Worker`] runs tasks one at a time, in submission order
//!
//! Records left in the store by a crash are picked up by
//! [`JobManager::recovery_sweep`] at the next start.

pub mod encoder;
pub mod manager;
pub mod postgres;
pub mod registry;
pub mod store;
pub mod task;
pub mod tasks;
pub mod types;
pub mod worker;

pub use encoder::{DecodeContext, DecodeError, EncodeError, JobEncoder, JobRequest};
pub use manager::{JobManager, RecoveryReport, SubmitError};
pub use postgres::PostgresJobStore;
pub use registry::{EncoderRegistry, RegistryError};
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use task::{Task, TaskError};
pub use types::{JobId, JobRecord, JobType};
pub use worker::{Worker, WorkerConfig, WorkerError, WorkerEvent, WorkerListener, WorkerState};
