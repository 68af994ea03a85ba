use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::{AnalysisOutcome, JobError, analyze_upload};
use crate::store::SqliteStore;

const MAX_WORKERS: usize = 64;

type JobResult = Result<AnalysisOutcome, JobError>;

struct Job {
    upload_id: i64,
    cancel: Arc<AtomicBool>,
    reply: Sender<JobResult>,
}

/// Handle to one submitted analysis job.
pub struct AnalysisTicket {
    upload_id: i64,
    cancel: Arc<AtomicBool>,
    result: Receiver<JobResult>,
}

impl AnalysisTicket {
    pub fn upload_id(&self) -> i64 {
        self.upload_id
    }

    /// Ask the worker to abandon this job; a cancelled job never writes its descriptor.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Block until the job finishes.
    pub fn wait(self) -> JobResult {
        self.result.recv().unwrap_or(Err(JobError::WorkerGone))
    }

    /// Non-blocking check for a finished job.
    pub fn try_result(&self) -> Option<JobResult> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(JobError::WorkerGone)),
        }
    }
}

/// Fixed set of worker threads, each with its own database connection.
pub struct AnalysisPool {
    sender: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl AnalysisPool {
    /// Start workers for the database at `database_path` and audio under `upload_dir`.
    ///
    /// `worker_count` of 0 picks the available parallelism.
    pub fn start(
        database_path: PathBuf,
        upload_dir: PathBuf,
        worker_count: u32,
    ) -> Result<Self, JobError> {
        // Create the schema once before workers race to open the file.
        SqliteStore::open(&database_path)?;
        let worker_count = resolve_worker_count(worker_count);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        info!("Analysis workers starting: {worker_count}");
        let threads = (0..worker_count)
            .map(|worker_index| {
                spawn_worker(
                    worker_index,
                    Arc::clone(&receiver),
                    database_path.clone(),
                    upload_dir.clone(),
                )
            })
            .collect();
        Ok(Self {
            sender: Some(sender),
            threads,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    /// Queue analysis of `upload_id`.
    pub fn submit(&self, upload_id: i64) -> Result<AnalysisTicket, JobError> {
        let sender = self.sender.as_ref().ok_or(JobError::WorkerGone)?;
        let cancel = Arc::new(AtomicBool::new(false));
        let (reply, result) = mpsc::channel();
        sender
            .send(Job {
                upload_id,
                cancel: Arc::clone(&cancel),
                reply,
            })
            .map_err(|_| JobError::WorkerGone)?;
        Ok(AnalysisTicket {
            upload_id,
            cancel,
            result,
        })
    }

    /// Finish queued jobs and join every worker.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("Analysis worker panicked");
            }
        }
    }
}

impl Drop for AnalysisPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Configured worker count, or the available parallelism for 0, capped at 64.
pub fn resolve_worker_count(configured: u32) -> usize {
    if configured >= 1 {
        return (configured as usize).min(MAX_WORKERS);
    }
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS)
}

fn spawn_worker(
    worker_index: usize,
    receiver: Arc<Mutex<Receiver<Job>>>,
    database_path: PathBuf,
    upload_dir: PathBuf,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut store: Option<SqliteStore> = None;
        loop {
            let next = {
                let guard = receiver
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.recv()
            };
            let Ok(job) = next else {
                debug!(worker_index, "Analysis worker exiting");
                return;
            };
            let result = run_job(&mut store, &database_path, &upload_dir, &job);
            if let Err(err) = &result {
                warn!(worker_index, upload_id = job.upload_id, "Analysis job failed: {err}");
            }
            let _ = job.reply.send(result);
        }
    })
}

fn run_job(
    store: &mut Option<SqliteStore>,
    database_path: &Path,
    upload_dir: &Path,
    job: &Job,
) -> JobResult {
    if job.cancel.load(Ordering::Relaxed) {
        return Err(JobError::Cancelled(job.upload_id));
    }
    let connection = match store.take() {
        Some(existing) => existing,
        None => SqliteStore::open(database_path)?,
    };
    let result = analyze_upload(&connection, upload_dir, job.upload_id, &job.cancel);
    *store = Some(connection);
    result
}
