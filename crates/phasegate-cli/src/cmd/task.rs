use crate::output::{or_dash, print_json, print_table, truncate};
use anyhow::Context;
use clap::Subcommand;
use phasegate_core::store::{FileStore, StateProvider};
use phasegate_core::task::{self, Task};
use phasegate_core::title;
use phasegate_core::types::Priority;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Add a todo task; the title's phase tag decides where it runs
    Add {
        #[arg(required = true)]
        title: Vec<String>,
        /// low, normal, high or critical
        #[arg(long, short = 'p', default_value = "normal")]
        priority: Priority,
        /// Explicit task id (default: next free T<n>)
        #[arg(long)]
        id: Option<String>,
        /// Extra context handed to the agent
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
    /// List tasks in stored order
    List,
    /// Show one task with its parsed key and notes
    Show { id: String },
    /// Put a failed, blocked or stale in-progress task back to todo
    Reset { id: String },
    /// Append a note to a task
    Note {
        id: String,
        #[arg(required = true)]
        text: Vec<String>,
    },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    let mut store = FileStore::open(root).context("failed to open task store")?;
    match subcmd {
        TaskSubcommand::Add {
            title,
            priority,
            id,
            description,
        } => add(
            &store,
            &title.join(" "),
            priority,
            id.as_deref(),
            description.as_deref(),
            json,
        ),
        TaskSubcommand::List => list(&store, json),
        TaskSubcommand::Show { id } => show(&store, &id, json),
        TaskSubcommand::Reset { id } => reset(&store, &id, json),
        TaskSubcommand::Note { id, text } => note(&mut store, &id, &text.join(" "), json),
    }
}

fn add(
    store: &FileStore,
    title: &str,
    priority: Priority,
    id: Option<&str>,
    description: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let task = store
        .add_task(title, id, priority, description)
        .context("failed to add task")?;
    let (key, rule) = title::explain(&task.title);

    if json {
        print_json(&serde_json::json!({
            "task": task,
            "key": key,
            "rule": rule,
        }))?;
    } else {
        println!("Added task [{}] key {key}: {}", task.id, task.title);
        if rule.is_none() {
            println!("  (no phase tag recognised; runs after all phased work)");
        }
    }
    Ok(())
}

fn list(store: &FileStore, json: bool) -> anyhow::Result<()> {
    let tasks = store.list_tasks().context("failed to load tasks")?;
    if json {
        return print_json(&tasks);
    }
    if tasks.is_empty() {
        println!("No tasks. Add one with: phasegate task add \"[AUTH-1.1] Login form\"");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.status.to_string(),
                t.priority.to_string(),
                t.key().to_string(),
                truncate(&t.title, 60),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "PRIORITY", "KEY", "TITLE"], &rows);
    println!();
    println!("{}", task::summarize(&tasks));
    Ok(())
}

fn show(store: &FileStore, id: &str, json: bool) -> anyhow::Result<()> {
    let task = store
        .get(id)
        .with_context(|| format!("task '{id}' not found"))?;
    let (key, rule) = title::explain(&task.title);

    if json {
        return print_json(&serde_json::json!({
            "task": task,
            "key": key,
            "rule": rule,
        }));
    }

    println!("ID:        {}", task.id);
    println!("Title:     {}", task.title);
    println!("Status:    {}", task.status);
    println!("Priority:  {}", task.priority);
    println!("Key:       {key} ({})", rule.unwrap_or("unordered"));
    println!("Created:   {}", task.created_at.to_rfc3339());
    if let Some(at) = task.started_at {
        println!("Started:   {}", at.to_rfc3339());
    }
    if let Some(at) = task.completed_at {
        println!("Completed: {}", at.to_rfc3339());
    }
    if task.blocker.is_some() {
        println!("Blocker:   {}", or_dash(task.blocker.as_deref()));
    }
    if let Some(desc) = &task.description {
        println!();
        println!("{desc}");
    }
    print_notes(&task);
    Ok(())
}

fn print_notes(task: &Task) {
    if task.notes.is_empty() {
        return;
    }
    println!();
    println!("Notes:");
    for n in &task.notes {
        println!("  [{}] {}", n.at.format("%Y-%m-%d %H:%M"), n.text);
    }
}

fn reset(store: &FileStore, id: &str, json: bool) -> anyhow::Result<()> {
    let task = store
        .reset_task(id)
        .with_context(|| format!("failed to reset task '{id}'"))?;
    if json {
        print_json(&serde_json::json!({ "id": task.id, "status": task.status }))?;
    } else {
        println!("Reset task [{}] to {}", task.id, task.status);
    }
    Ok(())
}

fn note(store: &mut FileStore, id: &str, text: &str, json: bool) -> anyhow::Result<()> {
    store
        .add_note(id, text)
        .with_context(|| format!("failed to add note to '{id}'"))?;
    if json {
        print_json(&serde_json::json!({ "id": id, "note": text }))?;
    } else {
        println!("Noted on [{id}]: {text}");
    }
    Ok(())
}
