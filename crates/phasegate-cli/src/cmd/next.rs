use crate::output::print_json;
use anyhow::Context;
use phasegate_core::gate::{self, GateDecision};
use phasegate_core::store::{FileStore, StateProvider};
use phasegate_core::types::TaskStatus;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = FileStore::open(root).context("failed to open task store")?;
    let tasks = store.list_tasks().context("failed to load tasks")?;
    let report = gate::evaluate(&tasks);

    let next = report.first_eligible(TaskStatus::Todo);
    let gated: Vec<&GateDecision> = report
        .blocked()
        .filter(|d| d.status == TaskStatus::Todo)
        .collect();
    let reason = match next {
        Some(_) => None,
        None if gated.is_empty() => Some("no todo tasks".to_string()),
        None => Some(format!(
            "all {} todo task(s) are waiting on unfinished predecessors",
            gated.len()
        )),
    };

    if json {
        return print_json(&serde_json::json!({
            "next": next,
            "reason": reason,
            "gated": gated,
        }));
    }

    match (next, reason) {
        (Some(d), _) => {
            println!("Next:      [{}] {}", d.id, d.title);
            println!("Key:       {}", d.key);
            println!("Priority:  {}", d.priority);
        }
        (None, reason) => {
            println!("Nothing to run: {}", reason.unwrap_or_default());
            for d in gated {
                println!("  [{}] {} waits on {}", d.id, d.key, d.blocker_summary());
            }
        }
    }
    Ok(())
}
