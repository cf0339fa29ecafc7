//! Background execution of ingestion jobs.
//!
//! One worker thread per job. Jobs against the same project interleave
//! safely because label-type creation is ignore-duplicate and each
//! batch flush is transactional. There is no cancellation; a submitted
//! job runs to completion or failure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::formats::FormatKind;
use crate::ids::{JobId, ProjectId, UserId};
use crate::ingest::{ingest, IngestOptions, IngestReport};
use crate::store::ProjectStore;
use crate::writer::DEFAULT_BATCH_SIZE;

/// Everything needed to run one ingestion job.
#[derive(Clone, Debug)]
pub struct JobRequest {
    pub project: ProjectId,
    pub user: UserId,
    pub format: FormatKind,
    pub files: Vec<PathBuf>,
    pub options: IngestOptions,
    pub batch_size: usize,
}

impl JobRequest {
    pub fn new(project: ProjectId, user: UserId, format: FormatKind, files: Vec<PathBuf>) -> Self {
        Self {
            project,
            user,
            format,
            files,
            options: IngestOptions::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Clone, Debug)]
pub enum JobStatus {
    Pending,
    Running,
    /// The job ran to completion; the report may still carry row errors.
    Done(IngestReport),
    /// The job aborted (storage failure, bad configuration).
    Failed(String),
}

/// Spawns and tracks ingestion jobs.
pub struct JobRunner {
    store: Arc<dyn ProjectStore>,
    jobs: Arc<Mutex<HashMap<JobId, JobStatus>>>,
    handles: Mutex<HashMap<JobId, JoinHandle<()>>>,
    next_id: AtomicI64,
}

impl JobRunner {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self {
            store,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Queues a job and returns immediately with its ID.
    pub fn submit(&self, request: JobRequest) -> JobId {
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.jobs).insert(id, JobStatus::Pending);

        let store = Arc::clone(&self.store);
        let jobs = Arc::clone(&self.jobs);
        let handle = std::thread::spawn(move || {
            lock(&jobs).insert(id, JobStatus::Running);
            info!(job = id.as_i64(), files = request.files.len(), "job running");
            let outcome = ingest(
                store.as_ref(),
                request.project,
                request.user,
                request.format,
                &request.files,
                &request.options,
                request.batch_size,
            );
            let status = match outcome {
                Ok(report) => {
                    info!(
                        job = id.as_i64(),
                        examples = report.examples,
                        errors = report.errors.len(),
                        "job done"
                    );
                    JobStatus::Done(report)
                }
                Err(err) => {
                    error!(job = id.as_i64(), error = %err, "job failed");
                    JobStatus::Failed(err.to_string())
                }
            };
            lock(&jobs).insert(id, status);
        });
        lock(&self.handles).insert(id, handle);
        id
    }

    /// The job's current status, or `None` for an unknown ID.
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        lock(&self.jobs).get(&id).cloned()
    }

    /// Blocks until the job's worker thread exits, then returns its
    /// final status.
    pub fn wait(&self, id: JobId) -> Option<JobStatus> {
        let handle = lock(&self.handles).remove(&id);
        if let Some(handle) = handle {
            // A panicked worker leaves the last recorded status behind.
            let _ = handle.join();
        }
        self.status(id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
