//! Dependency gate: a task may start only once every task with a strictly
//! lower `(phase, subtask)` key is `done`.
//!
//! Ticket keys `(∞, N)` are part of the barrier: they wait for all phased work
//! and for lower-numbered tickets. META and the unordered `(∞, ∞)` sentinel
//! sit outside it in both directions. Tasks sharing an identical key are peers
//! and never block each other.

use crate::order;
use crate::task::Task;
use crate::title::TaskKey;
use crate::types::{Priority, TaskStatus};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocker {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    Blocked { blockers: Vec<Blocker> },
}

#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    /// Position of the task in the slice handed to [`evaluate`].
    #[serde(skip)]
    pub index: usize,
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub key: TaskKey,
    #[serde(flatten)]
    pub eligibility: Eligibility,
}

impl GateDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self.eligibility, Eligibility::Eligible)
    }

    pub fn blockers(&self) -> &[Blocker] {
        match &self.eligibility {
            Eligibility::Eligible => &[],
            Eligibility::Blocked { blockers } => blockers,
        }
    }

    /// `"T2(in_progress), T3(todo)"`, for log lines and reports.
    pub fn blocker_summary(&self) -> String {
        self.blockers()
            .iter()
            .map(|b| format!("{}({})", b.id, b.status))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// GateReport
// ---------------------------------------------------------------------------

/// One decision per task, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct GateReport {
    pub decisions: Vec<GateDecision>,
}

impl GateReport {
    /// First eligible task in execution order whose current status is `status`.
    pub fn first_eligible(&self, status: TaskStatus) -> Option<&GateDecision> {
        self.decisions
            .iter()
            .find(|d| d.status == status && d.is_eligible())
    }

    pub fn blocked(&self) -> impl Iterator<Item = &GateDecision> {
        self.decisions.iter().filter(|d| !d.is_eligible())
    }

    pub fn decision(&self, id: &str) -> Option<&GateDecision> {
        self.decisions.iter().find(|d| d.id == id)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

pub fn evaluate(tasks: &[Task]) -> GateReport {
    let keys: Vec<TaskKey> = tasks.iter().map(Task::key).collect();
    let order = order::sorted_indices(tasks);

    let decisions = order
        .iter()
        .map(|&i| {
            let task = &tasks[i];
            let eligibility = if keys[i].is_gated() {
                let blockers: Vec<Blocker> = order
                    .iter()
                    .filter(|&&j| {
                        j != i
                            && keys[j].is_gated()
                            && keys[j] < keys[i]
                            && tasks[j].status != TaskStatus::Done
                    })
                    .map(|&j| Blocker {
                        id: tasks[j].id.clone(),
                        title: tasks[j].title.clone(),
                        status: tasks[j].status,
                    })
                    .collect();
                if blockers.is_empty() {
                    Eligibility::Eligible
                } else {
                    Eligibility::Blocked { blockers }
                }
            } else {
                Eligibility::Eligible
            };

            GateDecision {
                index: i,
                id: task.id.clone(),
                title: task.title.clone(),
                status: task.status,
                priority: task.priority,
                key: keys[i],
                eligibility,
            }
        })
        .collect();

    GateReport { decisions }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn blocker_ids(report: &GateReport, id: &str) -> Vec<(String, TaskStatus)> {
        report
            .decision(id)
            .unwrap()
            .blockers()
            .iter()
            .map(|b| (b.id.clone(), b.status))
            .collect()
    }

    #[test]
    fn reports_specific_blockers() {
        let tasks = vec![
            Task::new("AUTH-1.1", "[AUTH-1.1] Login").with_status(TaskStatus::Done),
            Task::new("AUTH-1.2", "[AUTH-1.2] Logout").with_status(TaskStatus::InProgress),
            Task::new("AUTH-1.3", "[AUTH-1.3] Reset"),
            Task::new("AUTH-2.1", "[AUTH-2.1] Sessions"),
        ];
        let report = evaluate(&tasks);

        assert!(report.decision("AUTH-1.1").unwrap().is_eligible());
        assert!(report.decision("AUTH-1.2").unwrap().is_eligible());
        assert_eq!(
            blocker_ids(&report, "AUTH-1.3"),
            vec![("AUTH-1.2".to_string(), TaskStatus::InProgress)]
        );
        assert_eq!(
            blocker_ids(&report, "AUTH-2.1"),
            vec![
                ("AUTH-1.2".to_string(), TaskStatus::InProgress),
                ("AUTH-1.3".to_string(), TaskStatus::Todo),
            ]
        );
        assert_eq!(
            report.decision("AUTH-2.1").unwrap().blocker_summary(),
            "AUTH-1.2(in_progress), AUTH-1.3(todo)"
        );
    }

    #[test]
    fn meta_is_never_blocked_and_never_blocks() {
        let tasks = vec![
            Task::new("m", "META: Tracker"),
            Task::new("p", "Phase 1.1 - first"),
            Task::new("q", "Phase 0.1 - zeroth").with_status(TaskStatus::Done),
        ];
        let report = evaluate(&tasks);
        assert!(report.decision("m").unwrap().is_eligible());
        assert!(report.decision("p").unwrap().is_eligible());
        assert_eq!(report.decisions[0].id, "m");
    }

    #[test]
    fn unordered_tasks_sit_outside_barrier() {
        let tasks = vec![
            Task::new("p1", "[X-1.1] pending"),
            Task::new("free", "Fix bug in login"),
            Task::new("p2", "[X-1.2] next"),
        ];
        let report = evaluate(&tasks);
        assert!(report.decision("free").unwrap().is_eligible());
        // The unordered task does not block p2 either.
        assert_eq!(
            blocker_ids(&report, "p2"),
            vec![("p1".to_string(), TaskStatus::Todo)]
        );
    }

    #[test]
    fn ticket_waits_for_unfinished_phased_work() {
        let tasks = vec![
            Task::new("auth", "[AUTH-1.1] Login").with_status(TaskStatus::Blocked),
            Task::new("bug", "PROJ-7 Crash on logout"),
            Task::new("free", "Polish docs"),
        ];
        let report = evaluate(&tasks);
        assert_eq!(
            blocker_ids(&report, "bug"),
            vec![("auth".to_string(), TaskStatus::Blocked)]
        );
        assert!(report.decision("free").unwrap().is_eligible());
        assert_eq!(report.first_eligible(TaskStatus::Todo).unwrap().id, "free");
    }

    #[test]
    fn tickets_wait_for_lower_tickets() {
        let tasks = vec![
            Task::new("p2", "PROJ-2 Second"),
            Task::new("p1", "PROJ-1 First"),
            Task::new("p2b", "[PROJ-2] Also second"),
            Task::new("done", "[AUTH-1.1] Login").with_status(TaskStatus::Done),
        ];
        let report = evaluate(&tasks);
        assert!(report.decision("p1").unwrap().is_eligible());
        assert_eq!(
            blocker_ids(&report, "p2"),
            vec![("p1".to_string(), TaskStatus::Todo)]
        );
        // Same ticket number: peers, blocked only by PROJ-1.
        assert_eq!(
            blocker_ids(&report, "p2b"),
            vec![("p1".to_string(), TaskStatus::Todo)]
        );
    }

    #[test]
    fn identical_keys_are_peers() {
        let tasks = vec![
            Task::new("a", "[API-1.1] A").with_status(TaskStatus::Done),
            Task::new("b1", "[API-2.1] B one"),
            Task::new("b2", "[API-2.1] B two"),
            Task::new("c", "[API-3.1] C"),
        ];
        let report = evaluate(&tasks);
        assert!(report.decision("b1").unwrap().is_eligible());
        assert!(report.decision("b2").unwrap().is_eligible());
        assert_eq!(blocker_ids(&report, "c").len(), 2);
    }

    #[test]
    fn failed_and_blocked_predecessors_still_block() {
        let tasks = vec![
            Task::new("a", "1.1: A").with_status(TaskStatus::Failed),
            Task::new("b", "1.2: B").with_status(TaskStatus::Blocked),
            Task::new("c", "1.3: C"),
        ];
        let report = evaluate(&tasks);
        assert_eq!(
            blocker_ids(&report, "c"),
            vec![
                ("a".to_string(), TaskStatus::Failed),
                ("b".to_string(), TaskStatus::Blocked),
            ]
        );
    }

    #[test]
    fn first_eligible_todo_follows_sort_order() {
        let tasks = vec![
            Task::new("late", "[A-2.1] later"),
            Task::new("done", "[A-1.1] done").with_status(TaskStatus::Done),
            Task::new("now", "[A-1.2] now"),
        ];
        let report = evaluate(&tasks);
        let next = report.first_eligible(TaskStatus::Todo).unwrap();
        assert_eq!(next.id, "now");
        assert_eq!(next.index, 2);
        assert_eq!(report.blocked().count(), 1);
    }

    #[test]
    fn malformed_titles_never_panic() {
        let tasks = vec![
            Task::new("a", "[-.]"),
            Task::new("b", "Phase .1"),
            Task::new("c", "::::"),
            Task::new("d", ""),
        ];
        let report = evaluate(&tasks);
        assert!(report.decisions.iter().all(GateDecision::is_eligible));
    }

    #[test]
    fn empty_input() {
        let report = evaluate(&[]);
        assert!(report.decisions.is_empty());
        assert!(report.first_eligible(TaskStatus::Todo).is_none());
    }
}
