//! Shared fixtures for unit and integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::bail;

use comicshelf_core::{ArchiveType, Comic, ComicId};

use crate::jobs::encoder::DecodeContext;
use crate::jobs::store::InMemoryJobStore;
use crate::jobs::task::{Task, TaskError};
use crate::jobs::types::JobType;
use crate::library::{
    ComicLibrary, ComicLookup, ConvertOptions, ImportOptions, InMemoryComicCatalog,
};

/// In-memory store, catalog and recording library wired together.
pub(crate) struct Harness {
    pub store: Arc<InMemoryJobStore>,
    pub catalog: Arc<InMemoryComicCatalog>,
    pub library: Arc<RecordingLibrary>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: InMemoryJobStore::arc(),
            catalog: Arc::new(InMemoryComicCatalog::new()),
            library: Arc::new(RecordingLibrary::new()),
        }
    }

    /// Add a live cbz comic at `/library/comic-{id}.cbz`.
    pub fn with_comic(self, id: i64) -> Self {
        self.catalog.insert(library_comic(id));
        self
    }

    pub fn with_deleted_comic(self, id: i64) -> Self {
        self.catalog.insert(library_comic(id).marked_deleted());
        self
    }

    pub fn comic(&self, id: i64) -> Comic {
        self.catalog
            .find_comic(ComicId::new(id))
            .unwrap()
            .expect("comic not in harness catalog")
    }

    pub fn context(&self) -> DecodeContext {
        DecodeContext::new(
            self.store.clone(),
            self.catalog.clone(),
            self.library.clone(),
        )
    }
}

fn library_comic(id: i64) -> Comic {
    Comic::new(
        ComicId::new(id),
        format!("/library/comic-{id}.cbz"),
        ArchiveType::Cbz,
    )
}

/// Empty file in the temp dir, unique per call.
pub(crate) fn scratch_file(name: &str) -> PathBuf {
    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "comicshelf-{}-{seq}-{name}",
        std::process::id()
    ));
    std::fs::write(&path, b"").unwrap();
    path
}

/// Library adaptor that records each call as a short string.
#[derive(Default)]
pub(crate) struct RecordingLibrary {
    calls: Mutex<Vec<String>>,
    failing: Mutex<Vec<ComicId>>,
    panicking: Mutex<Vec<ComicId>>,
    gates: Mutex<Vec<(ComicId, Gate)>>,
    next_id: AtomicI64,
}

impl RecordingLibrary {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls touching `id` return an error.
    pub fn fail_on(&self, id: ComicId) {
        self.failing.lock().unwrap().push(id);
    }

    /// Calls touching `id` panic.
    pub fn panic_on(&self, id: ComicId) {
        self.panicking.lock().unwrap().push(id);
    }

    /// Calls touching `id` block on `gate` until it is released.
    pub fn block_on(&self, id: ComicId, gate: Gate) {
        self.gates.lock().unwrap().push((id, gate));
    }

    fn record(&self, id: Option<ComicId>, call: String) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call.clone());

        let Some(id) = id else {
            return Ok(());
        };
        let gate = self
            .gates
            .lock()
            .unwrap()
            .iter()
            .find(|(gated, _)| *gated == id)
            .map(|(_, gate)| gate.clone());
        if let Some(gate) = gate {
            gate.enter();
        }
        if self.panicking.lock().unwrap().contains(&id) {
            panic!("library exploded on {call}");
        }
        if self.failing.lock().unwrap().contains(&id) {
            bail!("library refused {call}");
        }
        Ok(())
    }
}

impl ComicLibrary for RecordingLibrary {
    fn import(&self, filename: &Path, _options: ImportOptions) -> anyhow::Result<ComicId> {
        self.record(None, format!("import {}", filename.display()))?;
        Ok(ComicId::new(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn process(&self, comic: &Comic, _options: ImportOptions) -> anyhow::Result<()> {
        self.record(Some(comic.id), format!("process {}", comic.id))
    }

    fn convert(
        &self,
        comic: &Comic,
        target: ArchiveType,
        _options: ConvertOptions,
    ) -> anyhow::Result<()> {
        self.record(Some(comic.id), format!("convert {} {target}", comic.id))
    }

    fn relocate(
        &self,
        comic: &Comic,
        target_directory: &Path,
        _renaming_rule: &str,
    ) -> anyhow::Result<()> {
        self.record(
            Some(comic.id),
            format!("relocate {} {}", comic.id, target_directory.display()),
        )
    }

    fn delete(&self, comic: &Comic, delete_file: bool) -> anyhow::Result<()> {
        self.record(Some(comic.id), format!("delete {} {delete_file}", comic.id))
    }

    fn rescan(&self, comic: &Comic) -> anyhow::Result<()> {
        self.record(Some(comic.id), format!("rescan {}", comic.id))
    }

    fn undelete(&self, comic: &Comic) -> anyhow::Result<()> {
        self.record(Some(comic.id), format!("undelete {}", comic.id))
    }
}

/// One-shot rendezvous: the executing side signals entry, then waits for release.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

#[derive(Default)]
struct GateState {
    entered: bool,
    released: bool,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task that enters the gate, then logs `id` once released.
    pub fn task(&self, log: &TaskLog, job_type: JobType, id: usize) -> Box<dyn Task> {
        Box::new(GatedTask {
            gate: self.clone(),
            inner: LoggedTask {
                log: log.clone(),
                job_type,
                id,
                outcome: Outcome::Succeed,
            },
        })
    }

    pub fn enter(&self) {
        let (lock, signal) = &*self.inner;
        let mut state = lock.lock().unwrap();
        state.entered = true;
        signal.notify_all();
        while !state.released {
            state = signal.wait(state).unwrap();
        }
    }

    pub fn wait_entered(&self, timeout: Duration) -> bool {
        let (lock, signal) = &*self.inner;
        let state = lock.lock().unwrap();
        let (state, _) = signal
            .wait_timeout_while(state, timeout, |s| !s.entered)
            .unwrap();
        state.entered
    }

    pub fn release(&self) {
        let (lock, signal) = &*self.inner;
        lock.lock().unwrap().released = true;
        signal.notify_all();
    }
}

/// Shared execution log for worker tests.
#[derive(Clone, Default)]
pub(crate) struct TaskLog {
    entries: Arc<Mutex<Vec<usize>>>,
}

impl TaskLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<usize> {
        self.entries.lock().unwrap().clone()
    }

    pub fn task(&self, job_type: JobType, id: usize) -> Box<dyn Task> {
        self.with_outcome(job_type, id, Outcome::Succeed)
    }

    pub fn failing(&self, job_type: JobType, id: usize) -> Box<dyn Task> {
        self.with_outcome(job_type, id, Outcome::Fail)
    }

    pub fn panicking(&self, job_type: JobType, id: usize) -> Box<dyn Task> {
        self.with_outcome(job_type, id, Outcome::Panic)
    }

    fn with_outcome(&self, job_type: JobType, id: usize, outcome: Outcome) -> Box<dyn Task> {
        Box::new(LoggedTask {
            log: self.clone(),
            job_type,
            id,
            outcome,
        })
    }
}

enum Outcome {
    Succeed,
    Fail,
    Panic,
}

struct LoggedTask {
    log: TaskLog,
    job_type: JobType,
    id: usize,
    outcome: Outcome,
}

impl Task for LoggedTask {
    fn job_type(&self) -> JobType {
        self.job_type
    }

    fn description(&self) -> String {
        format!("logged task {}", self.id)
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        self.log.entries.lock().unwrap().push(self.id);
        match self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail => Err(TaskError::conflict(
                ComicId::new(self.id as i64),
                "scripted failure",
            )),
            Outcome::Panic => panic!("scripted panic in task {}", self.id),
        }
    }
}

struct GatedTask {
    gate: Gate,
    inner: LoggedTask,
}

impl Task for GatedTask {
    fn job_type(&self) -> JobType {
        self.inner.job_type
    }

    fn description(&self) -> String {
        format!("gated {}", self.inner.description())
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        self.gate.enter();
        Box::new(self.inner).execute()
    }
}
