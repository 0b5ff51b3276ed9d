//! Progress tracking for one orchestration call.
//!
//! Workers never touch the tracker's state directly. Each holds a
//! [`ProgressReporter`] and pushes a copy of its task after every state
//! change. A single listener task applies those copies under one mutex and
//! publishes a full [`ProgressSnapshot`] to subscribers.
//!
//! ```text
//! worker ──┐
//! worker ──┼─ mpsc ─▶ listener ─▶ Mutex<State> ─▶ broadcast ─▶ subscribers
//! worker ──┘                          ▲
//! orchestrator (register, phase) ─────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use super::task::{AgentTask, Phase, ProgressSnapshot};

/// Snapshots buffered per subscriber before it starts lagging.
const SUBSCRIBER_BUFFER: usize = 64;

/// A task copy sent from a worker to the tracker.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// The task as its worker last saw it.
    pub task: AgentTask,
}

/// Send side handed to each worker.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    /// Queues a copy of `task`. Never blocks.
    pub fn report(&self, task: &AgentTask) {
        // the listener only goes away once every reporter is dropped
        let _ = self.tx.send(ProgressEvent { task: task.clone() });
    }
}

#[derive(Debug, Default)]
struct State {
    phase: Phase,
    tasks: Vec<AgentTask>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    updates: broadcast::Sender<ProgressSnapshot>,
    started: Instant,
}

/// Thread-safe aggregator of task states for one call.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Creates an empty tracker in the `decomposing` phase.
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                updates,
                started: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, state: &State) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: state.phase,
            elapsed_ms: u64::try_from(self.inner.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            tasks: state.tasks.clone(),
        }
    }

    fn publish(&self, snapshot: ProgressSnapshot) {
        // no subscribers is fine
        let _ = self.inner.updates.send(snapshot);
    }

    /// Adds a task. Registering the same ID twice replaces the first copy.
    pub fn register(&self, task: &AgentTask) {
        let snapshot = {
            let mut state = self.lock();
            match state.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task.clone(),
                None => {
                    state.tasks.push(task.clone());
                    state.tasks.sort_by_key(|t| t.index);
                }
            }
            self.snapshot_of(&state)
        };
        self.publish(snapshot);
    }

    /// Applies a task copy.
    ///
    /// Returns `false` if the task is unknown or already terminal in a
    /// different state; terminal states are never left.
    pub fn update(&self, task: AgentTask) -> bool {
        let snapshot = {
            let mut state = self.lock();
            let Some(current) = state.tasks.iter_mut().find(|t| t.id == task.id) else {
                warn!(task = %task.id, "progress update for unregistered task");
                return false;
            };
            if current.state.is_terminal() && current.state != task.state {
                warn!(
                    agent = current.index,
                    from = %current.state,
                    to = %task.state,
                    "ignoring transition out of terminal state"
                );
                return false;
            }
            if current.state != task.state {
                debug!(
                    agent = task.index,
                    from = %current.state,
                    to = %task.state,
                    step = task.step_count,
                    "agent state changed"
                );
            }
            *current = task;
            self.snapshot_of(&state)
        };
        self.publish(snapshot);
        true
    }

    /// Sets the overall phase.
    pub fn set_phase(&self, phase: Phase) {
        let snapshot = {
            let mut state = self.lock();
            if state.phase == phase {
                return;
            }
            info!(phase = %phase, "orchestration phase");
            state.phase = phase;
            self.snapshot_of(&state)
        };
        self.publish(snapshot);
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// A consistent copy of every task and the phase.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        self.snapshot_of(&state)
    }

    /// Snapshots published after this call, one per change.
    ///
    /// A subscriber that falls behind skips the snapshots it missed.
    pub fn subscribe(&self) -> impl Stream<Item = ProgressSnapshot> + Send + 'static {
        BroadcastStream::new(self.inner.updates.subscribe())
            .filter_map(|item| async move { item.ok() })
    }

    /// Starts the listener and returns the reporter workers send to.
    ///
    /// The listener exits once every clone of the reporter is dropped;
    /// awaiting the handle then guarantees all queued events are applied.
    pub fn listen(&self) -> (ProgressReporter, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let tracker = self.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                tracker.update(event.task);
            }
        });
        (ProgressReporter { tx }, pump)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::agent::task::AgentState;
    use crate::error::TimeoutScope;

    fn running(index: usize) -> AgentTask {
        let mut task = AgentTask::new(index, format!("q{index}"));
        task.transition(AgentState::Running);
        task
    }

    #[test]
    fn test_register_orders_by_index() {
        let tracker = ProgressTracker::new();
        tracker.register(&AgentTask::new(2, "c"));
        tracker.register(&AgentTask::new(0, "a"));
        tracker.register(&AgentTask::new(1, "b"));
        let indices: Vec<usize> = tracker.snapshot().tasks.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let tracker = ProgressTracker::new();
        let mut task = running(0);
        tracker.register(&task);

        task.complete("done".to_string());
        assert!(tracker.update(task.clone()));

        let mut late = task.clone();
        late.state = AgentState::TimedOut;
        assert!(!tracker.update(late));
        assert_eq!(tracker.snapshot().tasks[0].state, AgentState::Completed);
    }

    #[test]
    fn test_update_unknown_task_is_rejected() {
        let tracker = ProgressTracker::new();
        assert!(!tracker.update(running(0)));
    }

    #[tokio::test]
    async fn test_listener_applies_reports_in_order() {
        let tracker = ProgressTracker::new();
        let mut task = running(0);
        tracker.register(&task);

        let (reporter, pump) = tracker.listen();
        task.step_count = 1;
        reporter.report(&task);
        task.transition(AgentState::ToolCall);
        reporter.report(&task);
        task.time_out(TimeoutScope::Agent);
        reporter.report(&task);
        drop(reporter);
        let _ = pump.await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.tasks[0].state, AgentState::TimedOut);
        assert_eq!(snapshot.tasks[0].step_count, 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_snapshot_per_change() {
        let tracker = ProgressTracker::new();
        let mut stream = Box::pin(tracker.subscribe());

        let task = running(0);
        tracker.register(&task);
        tracker.set_phase(Phase::Executing);
        tracker.set_phase(Phase::Executing);

        let first = stream.next().await;
        let second = stream.next().await;
        assert_eq!(first.map(|s| s.tasks.len()), Some(1));
        assert_eq!(second.map(|s| s.phase), Some(Phase::Executing));
        // the repeated phase produced nothing
        let third = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
        assert!(third.is_err());
    }
}
