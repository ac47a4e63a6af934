use crate::task::Task;
use crate::title::TaskKey;
use std::cmp::Reverse;

/// Queue position of a task: ascending key, then descending priority rank.
pub type SortKey = (TaskKey, Reverse<u8>);

pub fn sort_key(task: &Task) -> SortKey {
    (task.key(), Reverse(task.priority.rank()))
}

/// Indices into `tasks` in execution order.
///
/// Keys are recomputed from titles on every call and the sort is stable, so
/// tasks with identical keys keep their insertion order.
pub fn sorted_indices(tasks: &[Task]) -> Vec<usize> {
    let keys: Vec<SortKey> = tasks.iter().map(sort_key).collect();
    let mut order: Vec<usize> = (0..tasks.len()).collect();
    order.sort_by_key(|&i| keys[i]);
    order
}

pub fn sorted(tasks: &[Task]) -> Vec<&Task> {
    sorted_indices(tasks).into_iter().map(|i| &tasks[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    fn auth_fixture() -> Vec<Task> {
        vec![
            Task::new("a21", "[AUTH-2.1] Sessions").with_priority(Priority::High),
            Task::new("a13", "[AUTH-1.3] Reset").with_priority(Priority::Normal),
            Task::new("a11", "[AUTH-1.1] Login").with_priority(Priority::High),
            Task::new("meta", "META: X").with_priority(Priority::Low),
            Task::new("a12", "[AUTH-1.2] Logout").with_priority(Priority::High),
        ]
    }

    #[test]
    fn phase_and_subtask_dominate_priority() {
        let tasks = auth_fixture();
        assert_eq!(
            ids(&sorted(&tasks)),
            vec!["meta", "a11", "a12", "a13", "a21"]
        );
    }

    #[test]
    fn priority_breaks_ties() {
        let tasks = vec![
            Task::new("low", "Fix typo").with_priority(Priority::Low),
            Task::new("crit", "Fix outage").with_priority(Priority::Critical),
            Task::new("norm", "Fix lint"),
        ];
        assert_eq!(ids(&sorted(&tasks)), vec!["crit", "norm", "low"]);
    }

    #[test]
    fn unordered_tasks_sort_last() {
        let tasks = vec![
            Task::new("free", "Refactor logging").with_priority(Priority::Critical),
            Task::new("ticket", "PROJ-4 Bug"),
            Task::new("phased", "Phase 9.9 cleanup").with_priority(Priority::Low),
        ];
        assert_eq!(ids(&sorted(&tasks)), vec!["phased", "ticket", "free"]);
    }

    #[test]
    fn identical_keys_keep_insertion_order() {
        let tasks = vec![
            Task::new("second", "[API-1.1] Endpoint B"),
            Task::new("first", "[API-1.1] Endpoint A"),
            Task::new("zero", "[API-0.5] Schema"),
        ];
        let expected = vec!["zero", "second", "first"];
        for _ in 0..20 {
            assert_eq!(ids(&sorted(&tasks)), expected);
        }
    }

    #[test]
    fn sorted_indices_point_into_input() {
        let tasks = auth_fixture();
        assert_eq!(sorted_indices(&tasks), vec![3, 2, 4, 1, 0]);
    }
}
