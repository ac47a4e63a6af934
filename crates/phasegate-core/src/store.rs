//! State providers: where task status lives between sessions.
//!
//! The execution loop talks to a [`StateProvider`] only; the JSON file store
//! and the in-memory store are two interchangeable backends.

use crate::error::{PhasegateError, Result};
use crate::paths;
use crate::task::{self, Task};
use crate::types::{Priority, TaskStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub trait StateProvider {
    fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Persist a status the caller has already validated. `reason` is the
    /// blocker text for `blocked`/`failed`.
    fn update_status(&mut self, id: &str, status: TaskStatus, reason: Option<&str>) -> Result<()>;

    fn add_note(&mut self, id: &str, text: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    tasks: Vec<Task>,
}

fn default_version() -> u32 {
    1
}

/// JSON task tracker at `.phasegate/tasks.json`. Every write goes through
/// [`crate::io::write_json`], so a crash mid-session never leaves a torn file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open the store under `root`; fails with `NotInitialized` when missing.
    pub fn open(root: &Path) -> Result<Self> {
        let path = paths::tasks_path(root);
        if !path.exists() {
            return Err(PhasegateError::NotInitialized);
        }
        Ok(Self { path })
    }

    /// Create an empty store under `root` unless one exists.
    pub fn init(root: &Path) -> Result<Self> {
        let path = paths::tasks_path(root);
        crate::io::create_json(
            &path,
            &TaskFile {
                version: 1,
                tasks: Vec::new(),
            },
        )?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<TaskFile> {
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, file: &TaskFile) -> Result<()> {
        crate::io::write_json(&self.path, file)
    }

    fn modify<T>(&self, f: impl FnOnce(&mut Vec<Task>) -> Result<T>) -> Result<T> {
        let mut file = self.load()?;
        let out = f(&mut file.tasks)?;
        self.save(&file)?;
        Ok(out)
    }

    /// Append a `todo` task. Issues a `T<n>` id unless `id` is given.
    pub fn add_task(
        &self,
        title: &str,
        id: Option<&str>,
        priority: Priority,
        description: Option<&str>,
    ) -> Result<Task> {
        self.modify(|tasks| {
            let id = match id {
                Some(id) if tasks.iter().any(|t| t.id == id) => {
                    return Err(PhasegateError::TaskExists(id.to_string()))
                }
                Some(id) => id.to_string(),
                None => task::next_id(tasks),
            };
            let mut new = Task::new(id, title).with_priority(priority);
            new.description = description.map(str::to_string);
            tasks.push(new.clone());
            Ok(new)
        })
    }

    /// Manual reset to `todo` (see [`Task::reset`]).
    pub fn reset_task(&self, id: &str) -> Result<Task> {
        self.modify(|tasks| {
            let task = task::find_mut(tasks, id)?;
            task.reset()?;
            Ok(task.clone())
        })
    }

    pub fn get(&self, id: &str) -> Result<Task> {
        let file = self.load()?;
        task::find(&file.tasks, id).cloned()
    }
}

impl StateProvider for FileStore {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.load()?.tasks)
    }

    fn update_status(&mut self, id: &str, status: TaskStatus, reason: Option<&str>) -> Result<()> {
        self.modify(|tasks| {
            task::find_mut(tasks, id)?.apply(status, reason);
            Ok(())
        })
    }

    fn add_note(&mut self, id: &str, text: &str) -> Result<()> {
        self.modify(|tasks| {
            task::find_mut(tasks, id)?.add_note(text);
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub id: String,
    pub status: TaskStatus,
}

/// In-process provider. Keeps the sequence of status writes it received.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: Vec<Task>,
    updates: Vec<StatusUpdate>,
}

impl MemoryStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            updates: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn updates(&self) -> &[StatusUpdate] {
        &self.updates
    }
}

impl StateProvider for MemoryStore {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    fn update_status(&mut self, id: &str, status: TaskStatus, reason: Option<&str>) -> Result<()> {
        task::find_mut(&mut self.tasks, id)?.apply(status, reason);
        self.updates.push(StatusUpdate {
            id: id.to_string(),
            status,
        });
        Ok(())
    }

    fn add_note(&mut self, id: &str, text: &str) -> Result<()> {
        task::find_mut(&mut self.tasks, id)?.add_note(text);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_before_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FileStore::open(dir.path()),
            Err(PhasegateError::NotInitialized)
        ));
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        store
            .add_task("[A-1.1] First", None, Priority::Normal, None)
            .unwrap();
        FileStore::init(dir.path()).unwrap();
        assert_eq!(store.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn add_task_issues_sequential_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        let a = store.add_task("one", None, Priority::Low, None).unwrap();
        let b = store
            .add_task("two", None, Priority::High, Some("details"))
            .unwrap();
        assert_eq!(a.id, "T1");
        assert_eq!(b.id, "T2");

        let loaded = store.get("T2").unwrap();
        assert_eq!(loaded.priority, Priority::High);
        assert_eq!(loaded.description.as_deref(), Some("details"));
    }

    #[test]
    fn add_task_rejects_duplicate_id() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        store
            .add_task("a", Some("PROJ-1"), Priority::Normal, None)
            .unwrap();
        let err = store
            .add_task("b", Some("PROJ-1"), Priority::Normal, None)
            .unwrap_err();
        assert!(matches!(err, PhasegateError::TaskExists(_)));
    }

    #[test]
    fn update_status_persists_to_disk() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::init(dir.path()).unwrap();
        store.add_task("a", None, Priority::Normal, None).unwrap();

        store
            .update_status("T1", TaskStatus::InProgress, None)
            .unwrap();
        store
            .update_status("T1", TaskStatus::Blocked, Some("needs creds"))
            .unwrap();
        store.add_note("T1", "asked ops for creds").unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let task = reopened.get("T1").unwrap();
        assert_eq!(task.status, TaskStatus::Blocked);
        assert_eq!(task.blocker.as_deref(), Some("needs creds"));
        assert!(task.started_at.is_some());
        assert_eq!(task.notes.len(), 1);
    }

    #[test]
    fn update_unknown_task_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::init(dir.path()).unwrap();
        assert!(matches!(
            store.update_status("T9", TaskStatus::Done, None),
            Err(PhasegateError::TaskNotFound(_))
        ));
    }

    #[test]
    fn reset_task_from_failed() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::init(dir.path()).unwrap();
        store.add_task("a", None, Priority::Normal, None).unwrap();
        store
            .update_status("T1", TaskStatus::Failed, Some("boom"))
            .unwrap();

        let task = store.reset_task("T1").unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.blocker.is_none());
    }

    #[test]
    fn file_without_version_loads() {
        let dir = TempDir::new().unwrap();
        let path = paths::tasks_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"tasks":[{"id":"X","title":"Phase 1.1 x","created_at":"2025-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Todo);
        assert_eq!(tasks[0].priority, Priority::Normal);
    }

    #[test]
    fn minimal_external_record_loads_and_runs_through_store() {
        let dir = TempDir::new().unwrap();
        let path = paths::tasks_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"tasks":[{"id":"EXT-1","title":"[AUTH-1.1] Imported"}]}"#,
        )
        .unwrap();

        let mut store = FileStore::open(dir.path()).unwrap();
        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks[0].id, "EXT-1");
        assert_eq!(tasks[0].status, TaskStatus::Todo);

        store
            .update_status("EXT-1", TaskStatus::InProgress, None)
            .unwrap();
        let reloaded = store.get("EXT-1").unwrap();
        assert_eq!(reloaded.status, TaskStatus::InProgress);
        // The first write back fills in the missing timestamp.
        assert!(std::fs::read_to_string(&path).unwrap().contains("created_at"));
    }

    #[test]
    fn memory_store_records_updates() {
        let mut store = MemoryStore::new(vec![Task::new("a", "x")]);
        store
            .update_status("a", TaskStatus::InProgress, None)
            .unwrap();
        assert_eq!(
            store.updates(),
            &[StatusUpdate {
                id: "a".into(),
                status: TaskStatus::InProgress
            }]
        );
        assert_eq!(store.tasks()[0].status, TaskStatus::InProgress);
    }
}
