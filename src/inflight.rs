//! Deduplication of concurrent analyses for the same identifier.
//!
//! The registry guarantees at most one full fetch-and-analyze pipeline per
//! canonical identifier: the first request claims a slot and runs, later
//! requests receive a watch channel carrying the eventual outcome. The slot
//! guard publishes and clears the entry on drop, so a failed or cancelled
//! analysis never strands its waiters or leaks the marker.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use crate::analysis::AnalysisResult;
use crate::error::{AnalysisFailure, ErrorKind};

/// Terminal outcome broadcast to everyone waiting on one analysis.
pub type AnalysisOutcome = Result<Arc<AnalysisResult>, AnalysisFailure>;

type OutcomeReceiver = watch::Receiver<Option<AnalysisOutcome>>;
type Registry = Arc<Mutex<FxHashMap<String, OutcomeReceiver>>>;

/// Registry of analyses currently in progress, keyed by canonical
/// identifier. Distinct from the completed-result cache.
#[derive(Clone, Default)]
pub struct InflightMap {
    inner: Registry,
}

/// Result of trying to claim an identifier.
pub enum Claim {
    /// This caller runs the pipeline and must publish through the slot.
    Owner(InflightSlot),
    /// Another caller is already running it; wait on the receiver.
    Waiter(OutcomeReceiver),
}

impl InflightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, becoming the owner if nobody holds it yet.
    pub fn claim(&self, key: &str) -> Claim {
        let mut inner = self.inner.lock();
        if let Some(rx) = inner.get(key) {
            return Claim::Waiter(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        inner.insert(key.to_string(), rx);
        Claim::Owner(InflightSlot {
            key: key.to_string(),
            registry: Arc::clone(&self.inner),
            sender: tx,
            published: false,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive right to run the analysis for one identifier.
///
/// Dropping the slot without publishing broadcasts a failure so waiters are
/// released; either way the registry entry is removed.
pub struct InflightSlot {
    key: String,
    registry: Registry,
    sender: watch::Sender<Option<AnalysisOutcome>>,
    published: bool,
}

impl InflightSlot {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Broadcast the terminal outcome and release the slot.
    pub fn publish(mut self, outcome: AnalysisOutcome) {
        self.published = true;
        let _ = self.sender.send(Some(outcome));
    }
}

impl Drop for InflightSlot {
    fn drop(&mut self) {
        if !self.published {
            let _ = self.sender.send(Some(Err(AnalysisFailure::new(
                ErrorKind::FetchFailed,
                "analysis was aborted before producing a result",
            ))));
        }
        self.registry.lock().remove(&self.key);
    }
}

/// Wait for an in-flight outcome, up to `timeout`.
///
/// `None` means the analysis is still running: a well-defined "still
/// processing" answer, never an unbounded wait.
pub async fn wait_for(mut rx: OutcomeReceiver, timeout: Duration) -> Option<AnalysisOutcome> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(outcome) = rx.borrow_and_update().clone() {
            return Some(outcome);
        }
        match tokio::time::timeout_at(deadline, rx.changed()).await {
            Ok(Ok(())) => continue,
            // Sender gone; take whatever was last published.
            Ok(Err(_)) => return rx.borrow().clone(),
            Err(_) => return None,
        }
    }
}
