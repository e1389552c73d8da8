//! Background execution of large analyses.
//!
//! Document fetch plus two model calls can outlast any reasonable request
//! timeout, so the orchestrator gives synchronous callers a bounded-latency
//! contract: submit returns a handle immediately, workers pull job
//! descriptors from a shared MPMC queue (each job is delivered to exactly
//! one worker), and the handle can be polled or awaited with the caller's
//! own timeout. Failed jobs carry the underlying error kind and are not
//! retried automatically; retrying is the caller's decision.

mod worker;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::error::AnalysisFailure;
use crate::identifier::BillIdentifier;
use crate::inflight::InflightSlot;
use crate::locator::DocumentReference;
use crate::pipeline::AnalysisPipeline;

pub type JobId = Uuid;

/// Lifecycle of one submitted job. Terminal states are immutable.
#[derive(Debug, Clone)]
pub enum JobState {
    Queued,
    Running,
    Succeeded(Arc<AnalysisResult>),
    Failed(AnalysisFailure),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded(_) | JobState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded(_) => "succeeded",
            JobState::Failed(_) => "failed",
        }
    }
}

/// Bookkeeping for one submitted job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub identifier: BillIdentifier,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

struct JobRequest {
    id: JobId,
    reference: DocumentReference,
    slot: InflightSlot,
}

#[derive(Default)]
struct JobTable {
    inner: Mutex<FxHashMap<JobId, (JobRecord, watch::Sender<JobState>)>>,
}

impl JobTable {
    fn insert(&self, record: JobRecord) -> watch::Receiver<JobState> {
        let (tx, rx) = watch::channel(record.state.clone());
        self.inner.lock().insert(record.id, (record, tx));
        rx
    }

    fn update(&self, id: JobId, state: JobState) {
        let mut inner = self.inner.lock();
        if let Some((record, tx)) = inner.get_mut(&id) {
            if record.state.is_terminal() {
                return;
            }
            if state.is_terminal() {
                record.completed_at = Some(Utc::now());
            }
            record.state = state.clone();
            let _ = tx.send(state);
        }
    }

    fn get(&self, id: JobId) -> Option<JobRecord> {
        self.inner.lock().get(&id).map(|(record, _)| record.clone())
    }
}

/// Handle returned by [`JobOrchestrator::submit`].
pub struct JobHandle {
    id: JobId,
    table: Arc<JobTable>,
    rx: watch::Receiver<JobState>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current state without blocking.
    pub fn poll(&self) -> JobState {
        self.rx.borrow().clone()
    }

    /// Full record, including timestamps.
    pub fn record(&self) -> Option<JobRecord> {
        self.table.get(self.id)
    }

    /// Block until the job reaches a terminal state, up to `timeout`.
    ///
    /// `None` means the job is still queued or running.
    pub async fn wait(&mut self, timeout: Duration) -> Option<JobState> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.rx.borrow_and_update().clone();
            if state.is_terminal() {
                return Some(state);
            }
            match tokio::time::timeout_at(deadline, self.rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => {
                    let state = self.rx.borrow().clone();
                    return state.is_terminal().then_some(state);
                }
                Err(_) => return None,
            }
        }
    }
}

/// Owns the job queue, the job table, and the worker tasks.
///
/// Must be started within a tokio runtime. Dropping the orchestrator closes
/// the queue, which ends the worker loops once drained; [`shutdown`]
/// additionally waits for them.
///
/// [`shutdown`]: JobOrchestrator::shutdown
pub struct JobOrchestrator {
    queue: flume::Sender<JobRequest>,
    table: Arc<JobTable>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl JobOrchestrator {
    pub fn start(worker_count: usize, pipeline: Arc<AnalysisPipeline>) -> Self {
        let (queue, rx) = flume::unbounded::<JobRequest>();
        let table = Arc::new(JobTable::default());
        let workers = (0..worker_count.max(1))
            .map(|worker_id| {
                tokio::spawn(worker::run(
                    worker_id,
                    rx.clone(),
                    Arc::clone(&table),
                    Arc::clone(&pipeline),
                ))
            })
            .collect();
        Self {
            queue,
            table,
            workers,
        }
    }

    /// Enqueue a resolved bill reference and return a handle immediately.
    ///
    /// The in-flight slot travels with the job; the worker publishes the
    /// outcome through it, so waiters on the identifier and waiters on the
    /// handle see the same terminal state.
    pub fn submit(&self, reference: DocumentReference, slot: InflightSlot) -> JobHandle {
        let id = Uuid::new_v4();
        let record = JobRecord {
            id,
            identifier: reference.identifier.clone(),
            state: JobState::Queued,
            submitted_at: Utc::now(),
            completed_at: None,
        };
        info!(job = %id, bill = %record.identifier.canonical(), "job queued");
        let rx = self.table.insert(record);
        if let Err(rejected) = self.queue.send(JobRequest {
            id,
            reference,
            slot,
        }) {
            // Workers are gone; fail the job instead of letting it dangle.
            let request = rejected.into_inner();
            let failure = AnalysisFailure::new(
                crate::error::ErrorKind::FetchFailed,
                "job queue is shut down",
            );
            self.table.update(id, JobState::Failed(failure.clone()));
            request.slot.publish(Err(failure));
        }
        JobHandle {
            id,
            table: Arc::clone(&self.table),
            rx,
        }
    }

    /// Look up a job record by id.
    pub fn job(&self, id: JobId) -> Option<JobRecord> {
        self.table.get(id)
    }

    /// Close the queue and wait for the workers to drain and stop.
    pub async fn shutdown(self) {
        let JobOrchestrator { queue, workers, .. } = self;
        drop(queue);
        for handle in workers {
            let _ = handle.await;
        }
    }
}
