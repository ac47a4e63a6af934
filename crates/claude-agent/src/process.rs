use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::types::{Message, PermissionMode, QueryOptions};
use crate::{ClaudeAgentError, Result};

const STDERR_DRAIN: Duration = Duration::from_millis(500);

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A running `claude` subprocess speaking stream-json on both pipes.
///
/// The prompt goes in as a single user message, stdin is closed, and
/// replies are read as JSONL from stdout. Stderr is drained in the
/// background so a failed exit can be classified from it.
pub(crate) struct ClaudeProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr_buf: Arc<Mutex<String>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ClaudeProcess {
    pub(crate) async fn spawn(prompt: &str, opts: &QueryOptions) -> Result<Self> {
        let mut cmd = build_command(opts);
        // Nested sessions refuse to start when this is inherited.
        cmd.env_remove("CLAUDECODE");
        cmd.envs(&opts.env);

        let user_msg = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "text", "text": prompt}]
            }
        });
        Self::start(cmd, Some(&user_msg)).await
    }

    /// Run an arbitrary command in place of `claude`. Tests point this at
    /// `cat` or `sh -c` to replay canned output.
    #[cfg(test)]
    pub(crate) async fn spawn_command(cmd: Command) -> Result<Self> {
        Self::start(cmd, None).await
    }

    async fn start(mut cmd: Command, input: Option<&serde_json::Value>) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeAgentError::Process("stdout not captured".into()))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Some(msg) = input {
                let mut buf = serde_json::to_vec(msg).map_err(|e| {
                    ClaudeAgentError::Process(format!("failed to encode prompt: {e}"))
                })?;
                buf.push(b'\n');
                stdin.write_all(&buf).await?;
                stdin.flush().await?;
            }
            // Dropping stdin closes it: single-turn mode.
        }

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_task = child.stderr.take().map(|stderr| {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            })
        });

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stderr_buf,
            stderr_task,
        })
    }

    /// Next recognised message, or `None` at EOF. Blank lines and lines with
    /// an unrecognised `"type"` are skipped.
    pub(crate) async fn next_message(&mut self) -> Result<Option<Message>> {
        while let Some(line) = self.lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(trimmed) {
                Ok(msg) => return Ok(Some(msg)),
                Err(_) if has_unknown_type(trimmed) => {
                    tracing::trace!(line = trimmed, "skipping unhandled stream-json line");
                }
                Err(source) => {
                    return Err(ClaudeAgentError::Parse {
                        line: trimmed.to_owned(),
                        source,
                    })
                }
            }
        }
        Ok(None)
    }

    /// Wait for exit; `Some(err)` on a non-zero code or a signal.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<ClaudeAgentError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(ClaudeAgentError::Io(e)),
        };
        if status.success() {
            return None;
        }

        // Stderr hits EOF at exit unless a grandchild still holds it open.
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(STDERR_DRAIN, task).await;
        }
        let stderr = self
            .stderr_buf
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default();

        let summary = match status.code() {
            Some(code) => format!("claude exited with code {code}"),
            None => "claude terminated by signal".to_string(),
        };
        Some(ClaudeAgentError::from_exit(summary, stderr))
    }

    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// Valid JSON whose `"type"` we do not model (`user`, `rate_limit_event`, ...).
/// Known types that fail to parse are still reported as errors.
fn has_unknown_type(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_owned))
        .is_some_and(|t| !matches!(t.as_str(), "system" | "assistant" | "result"))
}

// ─── Command builder ──────────────────────────────────────────────────────

pub(crate) fn build_command(opts: &QueryOptions) -> Command {
    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    let mut cmd = Command::new(exe);

    cmd.args([
        "--output-format",
        "stream-json",
        "--verbose",
        "--input-format",
        "stream-json",
    ]);

    if let Some(model) = &opts.model {
        cmd.arg("--model").arg(model);
    }
    if let Some(max_turns) = opts.max_turns {
        cmd.arg("--max-turns").arg(max_turns.to_string());
    }
    if !opts.allowed_tools.is_empty() {
        cmd.arg("--allowed-tools").args(&opts.allowed_tools);
    }
    if opts.permission_mode != PermissionMode::Default {
        cmd.arg("--permission-mode")
            .arg(opts.permission_mode.as_str());
    }
    if let Some(sp) = &opts.system_prompt {
        cmd.arg("--system-prompt").arg(sp);
    }
    if let Some(append) = &opts.append_system_prompt {
        cmd.arg("--append-system-prompt").arg(append);
    }
    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }
    // Own process group: a Ctrl-C aimed at the caller must not kill the run.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

// ─── Tests ────────────────────────────────────────────────────────────────
