//! The execution loop: pick the next eligible task, run it, record the
//! outcome, repeat.
//!
//! ```text
//! list_tasks ─▶ [stop? limit?] ─▶ gate::evaluate ─▶ first eligible todo
//!                    ▲                                    │
//!                    │                          todo → in_progress (persisted)
//!                    │                                    │
//!                    │                              executor.execute
//!                    │                        (transient errors retried)
//!                    │                                    │
//!                    └──── done / blocked ◀── resolve ──▶ failed ─▶ halt
//! ```
//!
//! Execution is strictly sequential. The stop signal is read only between
//! iterations, so an in-flight task always finishes first.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::executor::{ExecError, ExecOutcome, ExecRequest, TaskExecutor};
use crate::gate::{self, Blocker};
use crate::notify::{Event, NotificationSink};
use crate::store::StateProvider;
use crate::task::Task;
use crate::types::TaskStatus;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// SessionLimits / StopSignal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SessionLimits {
    pub max_tasks: Option<u32>,
    pub max_turns: u32,
    pub transient_retries: u32,
    pub retry_blocked: bool,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionLimits {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            max_tasks: cfg.max_tasks,
            max_turns: cfg.max_turns,
            transient_retries: cfg.transient_retries,
            retry_blocked: cfg.retry_blocked,
        }
    }
}

/// Cooperative stop request, shared between the loop and whoever wants it to
/// stop (a Ctrl-C handler, a test).
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HaltReason {
    /// No `todo` task existed when the session started.
    NothingToRun,
    /// Every `todo` task was executed.
    Completed,
    /// `todo` tasks remain but all of them are gated.
    NoEligibleTask,
    TaskFailed { task_id: String, error: String },
    TaskLimit { limit: u32 },
    TurnLimit { task_id: String, turns: u32 },
    Stopped,
    StateProvider { task_id: String, error: String },
}

impl HaltReason {
    /// Halts an operator has to look at before the next session.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            HaltReason::TaskFailed { .. } | HaltReason::StateProvider { .. }
        )
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            HaltReason::TaskFailed { task_id, .. }
            | HaltReason::TurnLimit { task_id, .. }
            | HaltReason::StateProvider { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::NothingToRun => f.write_str("no todo tasks"),
            HaltReason::Completed => f.write_str("all todo tasks executed"),
            HaltReason::NoEligibleTask => {
                f.write_str("remaining todo tasks are waiting on unfinished predecessors")
            }
            HaltReason::TaskFailed { task_id, error } => {
                write!(f, "task {task_id} failed: {error}")
            }
            HaltReason::TaskLimit { limit } => write!(f, "session task limit ({limit}) reached"),
            HaltReason::TurnLimit { task_id, turns } => {
                write!(f, "task {task_id} hit the turn limit after {turns} turns")
            }
            HaltReason::Stopped => f.write_str("stop requested"),
            HaltReason::StateProvider { task_id, error } => {
                write!(f, "could not persist state for {task_id}: {error}")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRun {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub turns: Option<u32>,
    pub detail: Option<String>,
}

/// A task that is not done when the session ends.
#[derive(Debug, Clone, Serialize)]
pub struct PendingTask {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    /// Recorded blocker text for `blocked`/`failed` tasks.
    pub reason: Option<String>,
    /// Unfinished predecessors holding this task back.
    pub waiting_on: Vec<Blocker>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub executed: Vec<TaskRun>,
    pub halt: HaltReason,
    pub pending: Vec<PendingTask>,
}

impl SessionReport {
    fn new(executed: Vec<TaskRun>, halt: HaltReason, tasks: &[Task]) -> Self {
        let pending = gate::evaluate(tasks)
            .decisions
            .into_iter()
            .filter(|d| d.status != TaskStatus::Done)
            .map(|d| PendingTask {
                reason: tasks[d.index].blocker.clone(),
                waiting_on: d.blockers().to_vec(),
                id: d.id,
                title: d.title,
                status: d.status,
            })
            .collect();
        Self {
            executed,
            halt,
            pending,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskBoard
// ---------------------------------------------------------------------------

/// The session's task collection. Every status change goes through
/// [`TaskBoard::transition`]; the in-memory copy only changes once the
/// provider accepted the write.
struct TaskBoard<'p> {
    tasks: Vec<Task>,
    provider: &'p mut dyn StateProvider,
}

impl TaskBoard<'_> {
    fn transition(&mut self, idx: usize, to: TaskStatus, reason: Option<&str>) -> Result<()> {
        let mut next = self.tasks[idx].clone();
        next.transition(to, reason)?;
        self.provider.update_status(&next.id, to, reason)?;
        tracing::debug!(task_id = %next.id, status = %to, "status persisted");
        self.tasks[idx] = next;
        Ok(())
    }

    fn note(&mut self, idx: usize, text: &str) {
        let task = &mut self.tasks[idx];
        task.add_note(text);
        if let Err(e) = self.provider.add_note(&task.id, text) {
            tracing::warn!(task_id = %task.id, error = %e, "failed to record note");
        }
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// ExecutionLoop
// ---------------------------------------------------------------------------

pub struct ExecutionLoop<'a> {
    provider: &'a mut dyn StateProvider,
    executor: &'a mut dyn TaskExecutor,
    sink: &'a dyn NotificationSink,
    limits: SessionLimits,
    project: String,
}

impl<'a> ExecutionLoop<'a> {
    pub fn new(
        provider: &'a mut dyn StateProvider,
        executor: &'a mut dyn TaskExecutor,
        sink: &'a dyn NotificationSink,
        limits: SessionLimits,
    ) -> Self {
        Self {
            provider,
            executor,
            sink,
            limits,
            project: String::from("phasegate"),
        }
    }

    pub fn project(mut self, name: impl Into<String>) -> Self {
        self.project = name.into();
        self
    }

    /// Drive the session until it halts.
    ///
    /// Only a failure to list tasks is returned as `Err`; everything after
    /// that ends in a [`SessionReport`] whose `halt` says why.
    pub fn run(self, stop: &StopSignal) -> Result<SessionReport> {
        let Self {
            provider,
            executor,
            sink,
            limits,
            project,
        } = self;

        let tasks = provider.list_tasks()?;
        let mut board = TaskBoard { tasks, provider };

        if limits.retry_blocked {
            for idx in 0..board.tasks.len() {
                if board.tasks[idx].status != TaskStatus::Blocked {
                    continue;
                }
                if let Err(e) = board.transition(idx, TaskStatus::Todo, None) {
                    let halt = HaltReason::StateProvider {
                        task_id: board.tasks[idx].id.clone(),
                        error: e.to_string(),
                    };
                    return Ok(SessionReport::new(Vec::new(), halt, &board.tasks));
                }
                tracing::info!(task_id = %board.tasks[idx].id, "blocked task queued for retry");
            }
        }

        let todo = board.count(TaskStatus::Todo);
        if todo == 0 {
            return Ok(SessionReport::new(
                Vec::new(),
                HaltReason::NothingToRun,
                &board.tasks,
            ));
        }

        tracing::info!(project = %project, todo, "session started");
        emit(sink, Event::SessionStarted { project, todo });

        let mut executed: Vec<TaskRun> = Vec::new();

        let halt = loop {
            if stop.is_stopped() {
                break HaltReason::Stopped;
            }
            if let Some(limit) = limits.max_tasks {
                if executed.len() >= limit as usize {
                    break HaltReason::TaskLimit { limit };
                }
            }

            let report = gate::evaluate(&board.tasks);
            for d in report.blocked().filter(|d| d.status == TaskStatus::Todo) {
                tracing::debug!(
                    task_id = %d.id,
                    blockers = %d.blocker_summary(),
                    "dependency blocked"
                );
            }

            let Some(next) = report.first_eligible(TaskStatus::Todo) else {
                break if board.count(TaskStatus::Todo) > 0 {
                    HaltReason::NoEligibleTask
                } else {
                    HaltReason::Completed
                };
            };
            let idx = next.index;
            let id = board.tasks[idx].id.clone();
            let title = board.tasks[idx].title.clone();

            if let Err(e) = board.transition(idx, TaskStatus::InProgress, None) {
                break HaltReason::StateProvider {
                    task_id: id,
                    error: e.to_string(),
                };
            }
            tracing::info!(task_id = %id, key = %board.tasks[idx].key(), "task started");

            let (result, attempts) = execute_with_retry(executor, sink, &board.tasks[idx], &limits);

            let (status, detail, turns, halt) = match result {
                Ok(ExecOutcome::Completed { summary, turns }) => {
                    (TaskStatus::Done, Some(summary), Some(turns), None)
                }
                Ok(ExecOutcome::Blocked { reason }) => {
                    (TaskStatus::Blocked, Some(reason), None, None)
                }
                Ok(ExecOutcome::Failed { reason }) => (
                    TaskStatus::Failed,
                    Some(reason.clone()),
                    None,
                    Some(HaltReason::TaskFailed {
                        task_id: id.clone(),
                        error: reason,
                    }),
                ),
                Ok(ExecOutcome::TurnLimit { turns }) => (
                    TaskStatus::Blocked,
                    Some(format!("turn limit reached after {turns} turns")),
                    Some(turns),
                    Some(HaltReason::TurnLimit {
                        task_id: id.clone(),
                        turns,
                    }),
                ),
                Err(e) => (
                    TaskStatus::Failed,
                    Some(e.message().to_string()),
                    None,
                    Some(HaltReason::TaskFailed {
                        task_id: id.clone(),
                        error: e.message().to_string(),
                    }),
                ),
            };

            let reason = match status {
                TaskStatus::Blocked | TaskStatus::Failed => detail.as_deref(),
                _ => None,
            };
            if let Err(e) = board.transition(idx, status, reason) {
                break HaltReason::StateProvider {
                    task_id: id,
                    error: e.to_string(),
                };
            }
            if let Some(text) = detail.as_deref().filter(|t| !t.trim().is_empty()) {
                board.note(idx, text);
            }

            match status {
                TaskStatus::Done => tracing::info!(task_id = %id, attempts, "task done"),
                TaskStatus::Blocked => {
                    tracing::warn!(task_id = %id, reason = ?detail, "task blocked")
                }
                _ => tracing::error!(task_id = %id, reason = ?detail, "task failed"),
            }
            emit(
                sink,
                Event::TaskResolved {
                    id: id.clone(),
                    title: title.clone(),
                    status,
                    detail: detail.clone(),
                },
            );

            executed.push(TaskRun {
                id,
                title,
                status,
                attempts,
                turns,
                detail,
            });

            if let Some(halt) = halt {
                break halt;
            }
        };

        tracing::info!(executed = executed.len(), reason = %halt, "session halted");
        emit(
            sink,
            Event::SessionHalted {
                reason: halt.to_string(),
                executed: executed.len(),
            },
        );

        Ok(SessionReport::new(executed, halt, &board.tasks))
    }
}

/// Run one task, retrying transient failures up to `transient_retries` extra
/// times. A transient failure that outlives its retries comes back fatal.
fn execute_with_retry(
    executor: &mut dyn TaskExecutor,
    sink: &dyn NotificationSink,
    task: &Task,
    limits: &SessionLimits,
) -> (std::result::Result<ExecOutcome, ExecError>, u32) {
    let mut attempt = 1;
    loop {
        emit(
            sink,
            Event::TaskStarted {
                id: task.id.clone(),
                title: task.title.clone(),
                attempt,
            },
        );
        let request = ExecRequest {
            task,
            attempt,
            max_turns: limits.max_turns,
        };
        match executor.execute(&request) {
            Err(ExecError::Transient(msg)) if attempt <= limits.transient_retries => {
                tracing::warn!(
                    task_id = %task.id,
                    attempt,
                    error = %msg,
                    "transient executor failure, retrying"
                );
                attempt += 1;
            }
            Err(ExecError::Transient(msg)) => {
                return (
                    Err(ExecError::Fatal(format!(
                        "{msg} (still failing after {attempt} attempts)"
                    ))),
                    attempt,
                );
            }
            other => return (other, attempt),
        }
    }
}

fn emit(sink: &dyn NotificationSink, event: Event) {
    if let Err(e) = sink.notify(&event) {
        tracing::warn!(error = %e, "notification dropped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
