use std::path::{Path, PathBuf};

pub const PHASEGATE_DIR: &str = ".phasegate";
pub const CONFIG_FILE: &str = ".phasegate/config.yaml";
pub const TASKS_FILE: &str = ".phasegate/tasks.json";

pub fn phasegate_dir(root: &Path) -> PathBuf {
    root.join(PHASEGATE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn tasks_path(root: &Path) -> PathBuf {
    root.join(TASKS_FILE)
}
