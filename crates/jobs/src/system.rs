//! Process-level wiring of store, registry, worker and manager.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::config::JobSystemConfig;
use crate::jobs::encoder::DecodeContext;
use crate::jobs::manager::{JobManager, RecoveryReport};
use crate::jobs::registry::{EncoderRegistry, RegistryError};
use crate::jobs::store::{JobStore, JobStoreError};
use crate::jobs::worker::{Worker, WorkerError};
use crate::library::{ComicLibrary, ComicLookup};

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to open job store: {0}")]
    Store(JobStoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("recovery sweep failed: {0}")]
    Recovery(#[from] JobStoreError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// A running job engine.
#[derive(Debug)]
pub struct JobSystem {
    manager: JobManager,
    worker: Arc<Worker>,
    recovery: Option<RecoveryReport>,
}

impl JobSystem {
    /// Build the standard registry, recover leftover records if configured, then start
    /// the worker.
    pub fn start(
        config: &JobSystemConfig,
        store: Arc<dyn JobStore>,
        lookup: Arc<dyn ComicLookup>,
        library: Arc<dyn ComicLibrary>,
    ) -> Result<Self, StartError> {
        let ctx = DecodeContext::new(Arc::clone(&store), lookup, library);
        let registry = EncoderRegistry::standard(ctx);
        registry.ensure_complete()?;

        let worker = Arc::new(Worker::new(config.worker_config()));
        let manager = JobManager::new(store, Arc::new(registry), Arc::clone(&worker));

        let recovery = if config.recover_on_start {
            Some(manager.recovery_sweep()?)
        } else {
            None
        };

        worker.start()?;
        info!(worker = %worker.name(), "job system started");

        Ok(Self {
            manager,
            worker,
            recovery,
        })
    }

    /// Open the store named by `config.store` on `runtime`, then [`start`](Self::start).
    ///
    /// Blocks on `runtime`, so call it from outside any async context.
    pub fn from_config(
        config: &JobSystemConfig,
        runtime: &Handle,
        lookup: Arc<dyn ComicLookup>,
        library: Arc<dyn ComicLibrary>,
    ) -> Result<Self, StartError> {
        let store = runtime
            .block_on(config.store.open())
            .map_err(StartError::Store)?;
        Self::start(config, store, lookup, library)
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    /// Result of the startup sweep, if one ran.
    pub fn recovery(&self) -> Option<RecoveryReport> {
        self.recovery
    }

    /// Stop the worker after its in-flight task and wait for it to exit.
    pub fn shutdown(self) {
        self.worker.stop();
        self.worker.join();
        info!(worker = %self.worker.name(), "job system stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tasks::RescanComicParams;
    use crate::testing::Harness;
    use comicshelf_core::ComicId;
    use std::time::Duration;

    #[test]
    fn memory_backend_runs_submitted_jobs() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let harness = Harness::new().with_comic(3);
        let config = JobSystemConfig::default().with_worker_name("from-config-worker");

        let system = JobSystem::from_config(
            &config,
            runtime.handle(),
            harness.catalog.clone(),
            harness.library.clone(),
        )
        .unwrap();
        assert_eq!(system.recovery(), Some(RecoveryReport::default()));
        assert_eq!(system.worker().name(), "from-config-worker");

        system
            .manager()
            .submit(RescanComicParams::new(ComicId::new(3)))
            .unwrap();
        assert!(system.worker().await_idle(Duration::from_secs(5)));
        assert_eq!(harness.library.calls(), vec!["rescan 3".to_string()]);

        system.shutdown();
    }
}
