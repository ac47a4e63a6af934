use crate::error::{PhasegateError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tasks executed per session before the loop halts. `None` = unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tasks: Option<u32>,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Extra attempts after a transient executor failure.
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,
    /// Move `blocked` tasks back to `todo` when a session starts.
    #[serde(default)]
    pub retry_blocked: bool,
}

fn default_max_turns() -> u32 {
    200
}

fn default_transient_retries() -> u32 {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tasks: None,
            max_turns: default_max_turns(),
            transient_retries: default_transient_retries(),
            retry_blocked: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

pub const PERMISSION_MODES: &[&str] = &[
    "default",
    "acceptEdits",
    "bypassPermissions",
    "plan",
    "dontAsk",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model passed to `claude --model`; the CLI default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
    /// Custom path to the `claude` binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_to_executable: Option<String>,
}

fn default_allowed_tools() -> Vec<String> {
    ["Read", "Write", "Edit", "Bash", "Glob", "Grep"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_permission_mode() -> String {
    "acceptEdits".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            allowed_tools: default_allowed_tools(),
            permission_mode: default_permission_mode(),
            path_to_executable: None,
        }
    }
}

// ---------------------------------------------------------------------------
// NotifyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Chat webhook receiving `{"text": ...}` progress messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout")]
    pub timeout_seconds: u64,
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: default_notify_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            session: SessionConfig::default(),
            agent: AgentConfig::default(),
            notify: NotifyConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PhasegateError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        crate::io::write_yaml(&path, self)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.session.max_turns == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "session.max_turns is 0: every task would hit the turn limit".into(),
            });
        }

        if self.session.max_tasks == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "session.max_tasks is 0: sessions would halt before running anything"
                    .into(),
            });
        }

        if self.session.transient_retries > 5 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "session.transient_retries={} (>5 is unusual)",
                    self.session.transient_retries
                ),
            });
        }

        if !PERMISSION_MODES.contains(&self.agent.permission_mode.as_str()) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "unknown agent.permission_mode '{}' (expected one of: {})",
                    self.agent.permission_mode,
                    PERMISSION_MODES.join(", ")
                ),
            });
        }

        if let Some(url) = &self.notify.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("notify.webhook_url '{url}' is not an http(s) URL"),
                });
            }
        }

        warnings
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
    fn default_config_roundtrip() {
        let cfg = Config::new("test-project");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "test-project");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.session, SessionConfig::default());
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "project:\n  name: my-project\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.session.max_turns, 200);
        assert_eq!(cfg.session.transient_retries, 1);
        assert!(cfg.session.max_tasks.is_none());
        assert!(!cfg.session.retry_blocked);
        assert_eq!(cfg.agent.permission_mode, "acceptEdits");
        assert!(cfg.notify.webhook_url.is_none());
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(PhasegateError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("proj");
        cfg.session.max_tasks = Some(3);
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.session.max_tasks, Some(3));
    }

    #[test]
    fn validate_default_config_no_warnings() {
        assert!(Config::new("proj").validate().is_empty());
    }

    #[test]
    fn validate_flags_zero_limits() {
        let mut cfg = Config::new("proj");
        cfg.session.max_turns = 0;
        cfg.session.max_tasks = Some(0);
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn validate_unknown_permission_mode() {
        let mut cfg = Config::new("proj");
        cfg.agent.permission_mode = "yolo".into();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("yolo"));
    }

    #[test]
    fn validate_webhook_scheme() {
        let mut cfg = Config::new("proj");
        cfg.notify.webhook_url = Some("ftp://example.com/hook".into());
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }
}
