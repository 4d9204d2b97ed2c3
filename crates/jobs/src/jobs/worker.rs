//! Single-consumer task engine.
//!
//! One named thread drains an unbounded FIFO queue shared with any number of producers.
//! Queue, per-type counters and state sit behind one mutex; the consumer parks on a
//! condition variable while the queue is empty and is woken by `enqueue` or `stop`.
//!
//! There is no per-task timeout: a task that never returns stalls the worker.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::task::Task;
use super::types::JobType;

/// Lifecycle of a [`Worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    NotStarted,
    Running,
    Idle,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::NotStarted => "not_started",
            WorkerState::Running => "running",
            WorkerState::Idle => "idle",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Notification delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    StateChanged(WorkerState),
    QueueChanged { size: usize },
}

/// Observer of worker events.
///
/// Called synchronously on the consumer thread with no lock held. Implementations must
/// return quickly; a slow listener delays every queued task.
pub trait WorkerListener: Send + Sync {
    fn on_event(&self, event: &WorkerEvent);
}

impl<F> WorkerListener for F
where
    F: Fn(&WorkerEvent) + Send + Sync,
{
    fn on_event(&self, event: &WorkerEvent) {
        self(event)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer thread name, also used as the `worker` log field.
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "comicshelf-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker already started")]
    AlreadyStarted,
    #[error("worker was stopped before it started")]
    Stopped,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Inner {
    queue: VecDeque<Box<dyn Task>>,
    counts: HashMap<JobType, usize>,
    state: WorkerState,
    stop_requested: bool,
}

struct Shared {
    name: String,
    inner: Mutex<Inner>,
    /// Consumer wake-up: work arrived or stop requested.
    work: Condvar,
    /// Waiters in `await_idle`.
    settled: Condvar,
    listeners: RwLock<Vec<Arc<dyn WorkerListener>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: &[WorkerEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for event in events {
            for listener in &listeners {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
                if outcome.is_err() {
                    error!(worker = %self.name, event = ?event, "worker listener panicked");
                }
            }
        }
    }
}

/// What the consumer does after one pass under the lock.
enum Step {
    Run(Box<dyn Task>),
    Notify,
    Exit,
}

/// In-process executor for decoded tasks.
///
/// Strict FIFO across all job types, one task at a time. Dropping the worker stops it
/// and waits for the in-flight task.
pub struct Worker {
    shared: Arc<Shared>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Worker")
            .field("name", &self.shared.name)
            .field("state", &inner.state)
            .field("size", &inner.queue.len())
            .finish()
    }
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: config.name,
                inner: Mutex::new(Inner {
                    queue: VecDeque::new(),
                    counts: HashMap::new(),
                    state: WorkerState::NotStarted,
                    stop_requested: false,
                }),
                work: Condvar::new(),
                settled: Condvar::new(),
                listeners: RwLock::new(Vec::new()),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Spawn the consumer thread. Tasks queued before this call run first.
    pub fn start(&self) -> Result<(), WorkerError> {
        {
            let mut inner = self.shared.lock();
            match inner.state {
                WorkerState::NotStarted => inner.state = WorkerState::Running,
                WorkerState::Stopped => return Err(WorkerError::Stopped),
                WorkerState::Running | WorkerState::Idle => {
                    return Err(WorkerError::AlreadyStarted);
                }
            }
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || consumer_loop(&shared));

        match spawned {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                info!(worker = %self.shared.name, "worker started");
                Ok(())
            }
            Err(err) => {
                self.shared.lock().state = WorkerState::NotStarted;
                Err(WorkerError::Spawn(err))
            }
        }
    }

    /// Append a task to the queue.
    ///
    /// Never blocks beyond the queue lock. After `stop()` the task is dropped with a
    /// warning.
    pub fn enqueue(&self, task: Box<dyn Task>) {
        let job_type = task.job_type();
        {
            let mut inner = self.shared.lock();
            if inner.stop_requested {
                drop(inner);
                warn!(
                    worker = %self.shared.name,
                    job_type = %job_type,
                    task = %task.description(),
                    "worker stopped; task will not run"
                );
                return;
            }
            inner.queue.push_back(task);
            *inner.counts.entry(job_type).or_insert(0) += 1;
        }
        self.shared.work.notify_one();
    }

    /// Queued, not yet started tasks of `job_type`.
    pub fn count_pending(&self, job_type: JobType) -> usize {
        self.shared
            .lock()
            .counts
            .get(&job_type)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().queue.is_empty()
    }

    pub fn size(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn state(&self) -> WorkerState {
        self.shared.lock().state
    }

    pub fn add_listener(&self, listener: impl WorkerListener + 'static) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Ask the consumer to exit after its in-flight task. Idempotent.
    ///
    /// Queued tasks are abandoned. Before `start()` the worker goes straight to
    /// `Stopped`.
    pub fn stop(&self) {
        let stopped_early = {
            let mut inner = self.shared.lock();
            if inner.stop_requested {
                return;
            }
            inner.stop_requested = true;
            if inner.state == WorkerState::NotStarted {
                inner.state = WorkerState::Stopped;
                true
            } else {
                false
            }
        };

        info!(worker = %self.shared.name, "worker stop requested");
        self.shared.work.notify_all();
        if stopped_early {
            self.shared.settled.notify_all();
        }
    }

    /// Block until the worker is idle with an empty queue, or stopped.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn await_idle(&self, timeout: Duration) -> bool {
        let inner = self.shared.lock();
        let (_inner, result) = self
            .shared
            .settled
            .wait_timeout_while(inner, timeout, |inner| !is_settled(inner))
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out()
    }

    /// Wait for the consumer thread to exit. Only returns once `stop()` has been called.
    pub fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(worker = %self.shared.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

fn is_settled(inner: &Inner) -> bool {
    match inner.state {
        WorkerState::Stopped => true,
        WorkerState::Idle => inner.queue.is_empty(),
        WorkerState::NotStarted | WorkerState::Running => false,
    }
}

fn consumer_loop(shared: &Shared) {
    let name = shared.name.as_str();
    let mut reported_state = WorkerState::NotStarted;
    let mut reported_size = None;

    loop {
        let mut events = Vec::new();
        let step = {
            let mut inner = shared.lock();
            loop {
                if inner.stop_requested {
                    break Step::Exit;
                }

                if inner.state != reported_state {
                    reported_state = inner.state;
                    events.push(WorkerEvent::StateChanged(inner.state));
                }
                let size = inner.queue.len();
                if reported_size != Some(size) {
                    reported_size = Some(size);
                    events.push(WorkerEvent::QueueChanged { size });
                }

                if let Some(task) = inner.queue.pop_front() {
                    let job_type = task.job_type();
                    if let Some(count) = inner.counts.get_mut(&job_type) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            inner.counts.remove(&job_type);
                        }
                    }
                    if inner.state != WorkerState::Running {
                        inner.state = WorkerState::Running;
                        reported_state = WorkerState::Running;
                        events.push(WorkerEvent::StateChanged(WorkerState::Running));
                    }
                    let size = inner.queue.len();
                    reported_size = Some(size);
                    events.push(WorkerEvent::QueueChanged { size });
                    break Step::Run(task);
                }

                if inner.state != WorkerState::Idle {
                    inner.state = WorkerState::Idle;
                    reported_state = WorkerState::Idle;
                    events.push(WorkerEvent::StateChanged(WorkerState::Idle));
                    shared.settled.notify_all();
                }
                if !events.is_empty() {
                    break Step::Notify;
                }

                inner = shared
                    .work
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        shared.emit(&events);

        match step {
            Step::Run(task) => run_task(name, task),
            Step::Notify => {}
            Step::Exit => break,
        }
    }

    let abandoned = {
        let mut inner = shared.lock();
        inner.state = WorkerState::Stopped;
        inner.queue.len()
    };
    shared.settled.notify_all();
    shared.emit(&[WorkerEvent::StateChanged(WorkerState::Stopped)]);

    if abandoned > 0 {
        warn!(worker = name, abandoned, "worker stopped with queued tasks");
    }
    info!(worker = name, "worker stopped");
}

fn run_task(worker: &str, task: Box<dyn Task>) {
    let job_type = task.job_type();
    let description = task.description();
    debug!(worker, job_type = %job_type, task = %description, "task started");

    match panic::catch_unwind(AssertUnwindSafe(move || task.execute())) {
        Ok(Ok(())) => {
            debug!(worker, job_type = %job_type, task = %description, "task finished");
        }
        Ok(Err(err)) => {
            warn!(
                worker,
                job_type = %job_type,
                task = %description,
                error = %err,
                "task failed"
            );
        }
        Err(payload) => {
            error!(
                worker,
                job_type = %job_type,
                task = %description,
                panic = %panic_message(payload.as_ref()),
                "task panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
