use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ─── Message ──────────────────────────────────────────────────────────────

/// The subset of `claude --output-format stream-json` messages the driver
/// acts on. Lines with any other `"type"` (`user`, `stream_event`,
/// `tool_progress`, ...) are skipped by the reader.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Assistant(AssistantMessage),
    Result(ResultMessage),
}

impl Message {
    pub fn session_id(&self) -> &str {
        match self {
            Message::System(m) => &m.session_id,
            Message::Assistant(m) => &m.session_id,
            Message::Result(m) => m.session_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemMessage {
    pub session_id: String,
    #[serde(flatten)]
    pub payload: SystemPayload,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum SystemPayload {
    Init(SystemInit),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemInit {
    pub model: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default, alias = "permissionMode")]
    pub permission_mode: String,
    #[serde(default)]
    pub cwd: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub message: AssistantContent,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantContent {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

// ─── Result ───────────────────────────────────────────────────────────────

/// Terminal message of every run; `subtype` tells success from the error
/// conditions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ResultMessage {
    Success(ResultSuccess),
    ErrorDuringExecution(ResultError),
    ErrorMaxTurns(ResultError),
    ErrorMaxBudgetUsd(ResultError),
}

impl ResultMessage {
    fn common(&self) -> (&str, u32, f64) {
        match self {
            ResultMessage::Success(r) => (&r.session_id, r.num_turns, r.total_cost_usd),
            ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => (&r.session_id, r.num_turns, r.total_cost_usd),
        }
    }

    pub fn session_id(&self) -> &str {
        self.common().0
    }

    pub fn num_turns(&self) -> u32 {
        self.common().1
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.common().2
    }

    /// A success subtype can still carry `is_error: true` (API errors surfaced
    /// as the final text).
    pub fn is_error(&self) -> bool {
        match self {
            ResultMessage::Success(r) => r.is_error,
            _ => true,
        }
    }

    pub fn result_text(&self) -> Option<&str> {
        match self {
            ResultMessage::Success(r) => Some(&r.result),
            _ => None,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ResultMessage::Success(_) => &[],
            ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => &r.errors,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultSuccess {
    pub session_id: String,
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultError {
    pub session_id: String,
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ─── QueryOptions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub model: Option<String>,
    /// Turn budget; the CLI ends with `error_max_turns` when exceeded.
    pub max_turns: Option<u32>,
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub system_prompt: Option<String>,
    pub append_system_prompt: Option<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Defaults to `claude` on `PATH`.
    pub path_to_executable: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
    DontAsk,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
            PermissionMode::DontAsk => "dontAsk",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PermissionMode::Default),
            "acceptEdits" => Ok(PermissionMode::AcceptEdits),
            "bypassPermissions" => Ok(PermissionMode::BypassPermissions),
            "plan" => Ok(PermissionMode::Plan),
            "dontAsk" => Ok(PermissionMode::DontAsk),
            other => Err(format!("unknown permission mode '{other}'")),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
