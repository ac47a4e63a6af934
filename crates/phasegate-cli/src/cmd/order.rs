use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use phasegate_core::order;
use phasegate_core::store::{FileStore, StateProvider};
use phasegate_core::title::{self, TaskKey};
use phasegate_core::types::{Priority, TaskStatus};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct OrderEntry<'a> {
    position: usize,
    id: &'a str,
    title: &'a str,
    key: TaskKey,
    phase: u32,
    subtask: u32,
    priority: Priority,
    status: TaskStatus,
    rule: Option<&'static str>,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = FileStore::open(root).context("failed to open task store")?;
    let tasks = store.list_tasks().context("failed to load tasks")?;

    let entries: Vec<OrderEntry<'_>> = order::sorted(&tasks)
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            let (key, rule) = title::explain(&t.title);
            OrderEntry {
                position: i + 1,
                id: &t.id,
                title: &t.title,
                key,
                phase: key.phase(),
                subtask: key.subtask(),
                priority: t.priority,
                status: t.status,
                rule,
            }
        })
        .collect();

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.position.to_string(),
                e.id.to_string(),
                e.key.to_string(),
                e.priority.to_string(),
                e.status.to_string(),
                truncate(e.title, 60),
            ]
        })
        .collect();
    print_table(&["#", "ID", "KEY", "PRIORITY", "STATUS", "TITLE"], &rows);
    Ok(())
}
