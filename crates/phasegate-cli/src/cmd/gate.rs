use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use phasegate_core::gate;
use phasegate_core::store::{FileStore, StateProvider};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = FileStore::open(root).context("failed to open task store")?;
    let tasks = store.list_tasks().context("failed to load tasks")?;
    let report = gate::evaluate(&tasks);

    if json {
        return print_json(&report);
    }
    if report.decisions.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = report
        .decisions
        .iter()
        .map(|d| {
            let decision = if d.is_eligible() { "eligible" } else { "blocked" };
            vec![
                d.id.clone(),
                d.key.to_string(),
                d.status.to_string(),
                decision.to_string(),
                truncate(&d.blocker_summary(), 50),
                truncate(&d.title, 50),
            ]
        })
        .collect();
    print_table(
        &["ID", "KEY", "STATUS", "GATE", "WAITING ON", "TITLE"],
        &rows,
    );
    Ok(())
}
