//! `claude-agent`: drives the `claude` CLI over its stream-json protocol.
//!
//! ```text
//! RunConfig ─▶ ClaudeProcess ─▶ JSONL on stdout ─▶ Message ─▶ RunResult
//!              (prompt on stdin,                   (system, assistant,
//!               stderr captured)                    result; rest skipped)
//! ```
//!
//! ```rust,ignore
//! use claude_agent::{run, QueryOptions, RunConfig};
//!
//! let result = run(RunConfig {
//!     prompt: "Implement the login form".into(),
//!     opts: QueryOptions { max_turns: Some(50), ..Default::default() },
//! })
//! .await?;
//! if result.hit_turn_limit { /* ... */ }
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;

pub use error::ClaudeAgentError;
pub use runner::{run, RunConfig, RunResult};
pub use types::{
    ContentBlock, Message, PermissionMode, QueryOptions, ResultMessage, SystemPayload,
};

pub type Result<T> = std::result::Result<T, ClaudeAgentError>;
