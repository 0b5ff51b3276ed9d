//! In-memory registry of orchestration calls started over HTTP.
//!
//! Each call runs on its own task with its own [`ProgressTracker`] and a
//! cancellation token derived from the server's root token. Finished calls
//! are kept for polling up to a fixed count; the oldest finished entry is
//! evicted first. Running calls are never evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::orchestrator::Orchestrator;
use crate::agent::progress::ProgressTracker;
use crate::agent::task::{OrchestrationRequest, ProgressSnapshot, SynthesisResult};
use crate::error::OrchestrationError;

/// Finished entries retained by default.
pub const DEFAULT_RETAINED: usize = 256;

/// Outcome of a call as seen by a poller.
#[derive(Debug, Clone)]
pub enum CallStatus {
    /// Still running.
    Pending,
    /// Finished with this outcome.
    Finished(Result<SynthesisResult, OrchestrationError>),
}

#[derive(Debug)]
struct Entry {
    tracker: ProgressTracker,
    cancel: CancellationToken,
    outcome: Option<Result<SynthesisResult, OrchestrationError>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Uuid, Entry>,
    finished: VecDeque<Uuid>,
}

/// Shared registry of calls.
#[derive(Debug)]
pub struct CallRegistry {
    inner: Mutex<Inner>,
    retained: usize,
    root: CancellationToken,
}

impl CallRegistry {
    /// Creates a registry whose calls are cancelled when `root` is.
    pub fn new(retained: usize, root: CancellationToken) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            retained: retained.max(1),
            root,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `req` in the background and returns its id.
    ///
    /// The request must already be validated.
    pub fn start(self: &Arc<Self>, orchestrator: Arc<Orchestrator>, req: OrchestrationRequest) -> Uuid {
        let id = Uuid::new_v4();
        let tracker = ProgressTracker::new();
        let cancel = self.root.child_token();
        self.lock().entries.insert(
            id,
            Entry {
                tracker: tracker.clone(),
                cancel: cancel.clone(),
                outcome: None,
            },
        );
        info!(task_id = %id, "orchestration accepted");

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = orchestrator.execute_with(req, &tracker, cancel).await;
            registry.finish(id, outcome);
        });
        id
    }

    fn finish(&self, id: Uuid, outcome: Result<SynthesisResult, OrchestrationError>) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&id) else {
            return;
        };
        entry.outcome = Some(outcome);
        inner.finished.push_back(id);

        while inner.finished.len() > self.retained {
            if let Some(oldest) = inner.finished.pop_front() {
                inner.entries.remove(&oldest);
                debug!(task_id = %oldest, "evicted finished orchestration");
            }
        }
    }

    /// Current snapshot of a call.
    pub fn progress(&self, id: Uuid) -> Option<ProgressSnapshot> {
        self.lock().entries.get(&id).map(|e| e.tracker.snapshot())
    }

    /// Status of a call.
    pub fn status(&self, id: Uuid) -> Option<CallStatus> {
        self.lock().entries.get(&id).map(|e| {
            e.outcome
                .clone()
                .map_or(CallStatus::Pending, CallStatus::Finished)
        })
    }

    /// Cancels a call. Returns `false` for an unknown id.
    ///
    /// Cancelling a finished call is a no-op.
    pub fn cancel(&self, id: Uuid) -> bool {
        let inner = self.lock();
        let Some(entry) = inner.entries.get(&id) else {
            return false;
        };
        if entry.outcome.is_none() {
            info!(task_id = %id, "orchestration cancelled by caller");
            entry.cancel.cancel();
        }
        true
    }

    /// Number of calls still running.
    pub fn running(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| e.outcome.is_none())
            .count()
    }
}
