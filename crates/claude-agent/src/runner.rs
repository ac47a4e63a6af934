use crate::process::ClaudeProcess;
use crate::types::{ContentBlock, Message, QueryOptions, ResultMessage, SystemPayload};
use crate::{ClaudeAgentError, Result};

/// One agentic run: a prompt plus the options for the subprocess.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub prompt: String,
    pub opts: QueryOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub session_id: String,
    /// Final assistant text; empty for error subtypes.
    pub result_text: String,
    pub total_cost_usd: f64,
    pub num_turns: u32,
    pub is_error: bool,
    /// The run stopped on `error_max_turns`.
    pub hit_turn_limit: bool,
    /// Error strings reported by the CLI for error subtypes.
    pub errors: Vec<String>,
}

impl RunResult {
    fn from_result(r: &ResultMessage) -> Self {
        Self {
            session_id: r.session_id().to_string(),
            result_text: r.result_text().unwrap_or_default().to_string(),
            total_cost_usd: r.total_cost_usd(),
            num_turns: r.num_turns(),
            is_error: r.is_error(),
            hit_turn_limit: matches!(r, ResultMessage::ErrorMaxTurns(_)),
            errors: r.errors().to_vec(),
        }
    }
}

/// Spawn `claude`, drive it to its terminal `result` message and return it.
///
/// A process that exits without a result is reported from its exit status
/// and stderr, so an initialize timeout surfaces as
/// [`ClaudeAgentError::InitTimeout`].
pub async fn run(config: RunConfig) -> Result<RunResult> {
    let process = ClaudeProcess::spawn(&config.prompt, &config.opts).await?;
    collect(process).await
}

pub(crate) async fn collect(mut process: ClaudeProcess) -> Result<RunResult> {
    let outcome = drain(&mut process).await;
    let outcome = match outcome {
        Ok(Some(result)) => Ok(result),
        Ok(None) => Err(process
            .wait_exit_error()
            .await
            .unwrap_or(ClaudeAgentError::NoResult)),
        Err(e) => Err(e),
    };
    process.kill().await;
    outcome
}

async fn drain(process: &mut ClaudeProcess) -> Result<Option<RunResult>> {
    while let Some(msg) = process.next_message().await? {
        match msg {
            Message::System(sys) => {
                if let SystemPayload::Init(init) = sys.payload {
                    tracing::debug!(
                        session_id = %sys.session_id,
                        model = %init.model,
                        permission_mode = %init.permission_mode,
                        "claude session started"
                    );
                }
            }
            Message::Assistant(a) => {
                for block in &a.message.content {
                    if let ContentBlock::ToolUse { name, .. } = block {
                        tracing::debug!(tool = %name, "tool call");
                    }
                }
            }
            Message::Result(r) => return Ok(Some(RunResult::from_result(&r))),
        }
    }
    Ok(None)
}
