use crate::output::print_json;
use anyhow::Context;
use phasegate_core::{config::Config, paths, store::FileStore};
use std::path::Path;

pub fn run(root: &Path, project: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = project.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    let config_created = !paths::config_path(root).exists();
    if config_created {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
    }

    let tasks_created = !paths::tasks_path(root).exists();
    FileStore::init(root).context("failed to create tasks.json")?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "project": project_name,
            "config_created": config_created,
            "tasks_created": tasks_created,
        }))?;
    } else {
        println!("Initializing phasegate in: {}", root.display());
        for (file, created) in [
            (paths::CONFIG_FILE, config_created),
            (paths::TASKS_FILE, tasks_created),
        ] {
            let verb = if created { "created:" } else { "exists: " };
            println!("  {verb} {file}");
        }
    }
    Ok(())
}
