use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::persistence::UniverseStore;
use crate::universe::Universe;
use crate::{generate_universe, GenerationError};

#[derive(Debug)]
pub enum JobOutcome {
    Persisted(Universe),
    Cancelled,
    Failed(GenerationError),
}

impl JobOutcome {
    pub fn into_universe(self) -> Option<Universe> {
        match self {
            JobOutcome::Persisted(universe) => Some(universe),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("generation worker is no longer running")]
    Disconnected,
    #[error("generation worker panicked")]
    Panicked,
}

struct Job {
    id: u64,
    config: GenerationConfig,
    cancelled: Arc<AtomicBool>,
    reply: Sender<JobOutcome>,
}

/// Handle to a submitted job.
#[derive(Debug)]
pub struct GenerationTicket {
    id: u64,
    cancelled: Arc<AtomicBool>,
    reply: Receiver<JobOutcome>,
}

impl GenerationTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request cancellation. Has no effect once the universe is persisted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block until the worker reports the job's outcome.
    pub fn wait(self) -> Result<JobOutcome, WorkerError> {
        self.reply.recv().map_err(|_| WorkerError::Disconnected)
    }
}

/// Runs generations on a background thread and persists them into `S`.
pub struct GenerationWorker<S> {
    jobs: Option<Sender<Job>>,
    handle: Option<JoinHandle<S>>,
    next_id: u64,
}

impl<S> GenerationWorker<S>
where
    S: UniverseStore + Send + 'static,
{
    pub fn spawn(store: S) -> Self {
        let (jobs, queue) = unbounded::<Job>();
        let handle = thread::spawn(move || run_jobs(queue, store));
        Self {
            jobs: Some(jobs),
            handle: Some(handle),
            next_id: 0,
        }
    }

    pub fn submit(&mut self, config: GenerationConfig) -> Result<GenerationTicket, WorkerError> {
        let jobs = self.jobs.as_ref().ok_or(WorkerError::Disconnected)?;
        self.next_id += 1;
        let id = self.next_id;
        let cancelled = Arc::new(AtomicBool::new(false));
        let (reply, outcome) = bounded(1);
        jobs.send(Job {
            id,
            config,
            cancelled: Arc::clone(&cancelled),
            reply,
        })
        .map_err(|_| WorkerError::Disconnected)?;
        tracing::debug!(target: "universe_gen::worker", job = id, "worker.job.queued");
        Ok(GenerationTicket {
            id,
            cancelled,
            reply: outcome,
        })
    }

    /// Finish queued jobs, stop the thread and hand the store back.
    pub fn shutdown(mut self) -> Result<S, WorkerError> {
        self.jobs.take();
        let handle = self.handle.take().ok_or(WorkerError::Disconnected)?;
        handle.join().map_err(|_| WorkerError::Panicked)
    }
}

impl<S> Drop for GenerationWorker<S> {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(target: "universe_gen::worker", "worker.panicked");
            }
        }
    }
}

fn run_jobs<S: UniverseStore>(queue: Receiver<Job>, mut store: S) -> S {
    for job in queue.iter() {
        let outcome = run_job(&job, &mut store);
        tracing::debug!(
            target: "universe_gen::worker",
            job = job.id,
            outcome = outcome_label(&outcome),
            "worker.job.finished"
        );
        // The ticket may have been dropped; nobody is waiting then.
        let _ = job.reply.send(outcome);
    }
    store
}

fn run_job<S: UniverseStore>(job: &Job, store: &mut S) -> JobOutcome {
    if job.cancelled.load(Ordering::SeqCst) {
        return JobOutcome::Cancelled;
    }
    let universe = match generate_universe(&job.config) {
        Ok(universe) => universe,
        Err(err) => {
            tracing::warn!(
                target: "universe_gen::worker",
                job = job.id,
                error = %err,
                "worker.job.failed"
            );
            return JobOutcome::Failed(err);
        }
    };
    if job.cancelled.load(Ordering::SeqCst) {
        tracing::info!(
            target: "universe_gen::worker",
            job = job.id,
            fingerprint = format_args!("{:016x}", universe.fingerprint()),
            "worker.job.discarded"
        );
        return JobOutcome::Cancelled;
    }
    match store.persist(&universe) {
        Ok(()) => JobOutcome::Persisted(universe),
        Err(err) => JobOutcome::Failed(err.into()),
    }
}

fn outcome_label(outcome: &JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Persisted(_) => "persisted",
        JobOutcome::Cancelled => "cancelled",
        JobOutcome::Failed(_) => "failed",
    }
}
