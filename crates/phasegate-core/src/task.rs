use crate::error::{PhasegateError, Result};
use crate::title::{self, TaskKey};
use crate::types::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Records written by other tools may omit it; they load as created now.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blocker: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Normal,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            blocker: None,
            notes: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Ordering key parsed from the current title. Never stored.
    pub fn key(&self) -> TaskKey {
        title::parse(&self.title)
    }

    pub fn phase(&self) -> u32 {
        self.key().phase()
    }

    pub fn subtask(&self) -> u32 {
        self.key().subtask()
    }

    /// Apply a lifecycle transition, rejecting anything the lifecycle forbids.
    ///
    /// `reason` is recorded as the blocker for `blocked`/`failed` and cleared
    /// otherwise.
    pub fn transition(&mut self, to: TaskStatus, reason: Option<&str>) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(PhasegateError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.apply(to, reason);
        Ok(())
    }

    /// Manual reset back to `todo`. Allowed from `blocked`, `failed` and a
    /// stale `in_progress`; a `done` task stays done.
    pub fn reset(&mut self) -> Result<()> {
        match self.status {
            TaskStatus::Todo => Ok(()),
            TaskStatus::Blocked | TaskStatus::Failed | TaskStatus::InProgress => {
                self.apply(TaskStatus::Todo, None);
                Ok(())
            }
            TaskStatus::Done => Err(PhasegateError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: TaskStatus::Todo.to_string(),
            }),
        }
    }

    pub fn add_note(&mut self, text: impl Into<String>) {
        self.notes.push(Note {
            at: Utc::now(),
            text: text.into(),
        });
    }

    /// Write `to` and its timestamps without lifecycle validation. State
    /// providers replaying an already-validated transition use this.
    pub fn apply(&mut self, to: TaskStatus, reason: Option<&str>) {
        match to {
            TaskStatus::Todo => {
                self.started_at = None;
                self.completed_at = None;
                self.blocker = None;
            }
            TaskStatus::InProgress => {
                self.started_at = Some(Utc::now());
                self.blocker = None;
            }
            TaskStatus::Done => {
                self.completed_at = Some(Utc::now());
                self.blocker = None;
            }
            TaskStatus::Blocked | TaskStatus::Failed => {
                self.blocker = reason.map(str::to_string);
            }
        }
        self.status = to;
    }
}

// ---------------------------------------------------------------------------
// Task list operations
// ---------------------------------------------------------------------------

/// Next free `T<n>` id, skipping ids already taken by imported tasks.
pub fn next_id(tasks: &[Task]) -> String {
    let mut n = tasks.len() + 1;
    loop {
        let id = format!("T{n}");
        if !tasks.iter().any(|t| t.id == id) {
            return id;
        }
        n += 1;
    }
}

pub fn find<'a>(tasks: &'a [Task], id: &str) -> Result<&'a Task> {
    tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| PhasegateError::TaskNotFound(id.to_string()))
}

pub fn find_mut<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| PhasegateError::TaskNotFound(id.to_string()))
}

/// Human-readable summary: "3/5 done, 1 in progress, 1 blocked, 0 failed"
pub fn summarize(tasks: &[Task]) -> String {
    let count = |s: TaskStatus| tasks.iter().filter(|t| t.status == s).count();
    format!(
        "{}/{} done, {} in progress, {} blocked, {} failed",
        count(TaskStatus::Done),
        tasks.len(),
        count(TaskStatus::InProgress),
        count(TaskStatus::Blocked),
        count(TaskStatus::Failed),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_lifecycle() {
        let mut task = Task::new("T1", "[AUTH-1.1] Login form");
        assert_eq!(task.status, TaskStatus::Todo);

        task.transition(TaskStatus::InProgress, None).unwrap();
        assert!(task.started_at.is_some());

        task.transition(TaskStatus::Done, None).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn todo_cannot_jump_to_done() {
        let mut task = Task::new("T1", "Write docs");
        let err = task.transition(TaskStatus::Done, None).unwrap_err();
        assert!(matches!(err, PhasegateError::InvalidTransition { .. }));
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn blocked_records_reason_and_retries() {
        let mut task = Task::new("T1", "Deploy");
        task.transition(TaskStatus::InProgress, None).unwrap();
        task.transition(TaskStatus::Blocked, Some("waiting for infra"))
            .unwrap();
        assert_eq!(task.blocker.as_deref(), Some("waiting for infra"));

        task.transition(TaskStatus::Todo, None).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.blocker.is_none());
    }

    #[test]
    fn failed_only_leaves_through_reset() {
        let mut task = Task::new("T1", "Migrate");
        task.transition(TaskStatus::InProgress, None).unwrap();
        task.transition(TaskStatus::Failed, Some("boom")).unwrap();
        assert!(task.transition(TaskStatus::Todo, None).is_err());

        task.reset().unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn done_cannot_be_reset() {
        let mut task = Task::new("T1", "Ship").with_status(TaskStatus::Done);
        assert!(task.reset().is_err());
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn key_follows_title_rename() {
        let mut task = Task::new("T1", "[AUTH-1.2] Sessions");
        assert_eq!((task.phase(), task.subtask()), (1, 2));
        task.title = "Phase 3.4 - Sessions".to_string();
        assert_eq!((task.phase(), task.subtask()), (3, 4));
    }

    #[test]
    fn next_id_skips_taken_ids() {
        let tasks = vec![Task::new("T2", "a"), Task::new("X-9", "b")];
        assert_eq!(next_id(&tasks), "T3");
        let tasks = vec![Task::new("T1", "a")];
        assert_eq!(next_id(&tasks), "T2");
    }

    #[test]
    fn find_missing_task() {
        let tasks: Vec<Task> = Vec::new();
        assert!(matches!(
            find(&tasks, "T9"),
            Err(PhasegateError::TaskNotFound(_))
        ));
    }

    #[test]
    fn summary_counts_statuses() {
        let tasks = vec![
            Task::new("T1", "a").with_status(TaskStatus::Done),
            Task::new("T2", "b").with_status(TaskStatus::Blocked),
            Task::new("T3", "c"),
        ];
        assert_eq!(
            summarize(&tasks),
            "1/3 done, 0 in progress, 1 blocked, 0 failed"
        );
    }
}
