//! [`TaskExecutor`] backed by the `claude` CLI.
//!
//! The agent is asked to finish its reply with a status line:
//!
//! ```text
//! STATUS: DONE
//! STATUS: BLOCKED <what is needed>
//! STATUS: FAILED <what went wrong>
//! ```
//!
//! A successful run without the marker counts as done.

use claude_agent::{ClaudeAgentError, QueryOptions, RunConfig, RunResult};
use phasegate_core::executor::{ExecError, ExecOutcome, ExecRequest, TaskExecutor};
use phasegate_core::task::Task;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;

const SUMMARY_LIMIT: usize = 500;

pub struct ClaudeExecutor {
    handle: Handle,
    opts: QueryOptions,
    root: PathBuf,
}

impl ClaudeExecutor {
    pub fn new(handle: Handle, mut opts: QueryOptions, root: &Path) -> Self {
        opts.cwd.get_or_insert_with(|| root.to_path_buf());
        Self {
            handle,
            opts,
            root: root.to_path_buf(),
        }
    }
}

impl TaskExecutor for ClaudeExecutor {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, ExecError> {
        let config = RunConfig {
            prompt: build_prompt(request.task, &self.root),
            opts: QueryOptions {
                max_turns: Some(request.max_turns),
                ..self.opts.clone()
            },
        };
        tracing::debug!(task_id = %request.task.id, attempt = request.attempt, "invoking claude");
        let result = self.handle.block_on(claude_agent::run(config));
        interpret(result)
    }
}

/// Classify a driver result once, here, so the loop never looks at error text.
fn interpret(result: Result<RunResult, ClaudeAgentError>) -> Result<ExecOutcome, ExecError> {
    let run = match result {
        Ok(run) => run,
        Err(e) if e.is_transient() => return Err(ExecError::Transient(e.to_string())),
        Err(e) => return Err(ExecError::Fatal(e.to_string())),
    };
    tracing::info!(
        session_id = %run.session_id,
        turns = run.num_turns,
        cost_usd = run.total_cost_usd,
        "claude run finished"
    );

    if run.hit_turn_limit {
        return Ok(ExecOutcome::TurnLimit {
            turns: run.num_turns,
        });
    }
    if run.is_error {
        let detail = if run.errors.is_empty() {
            run.result_text.clone()
        } else {
            run.errors.join("; ")
        };
        return Err(ExecError::Fatal(format!("claude reported an error: {detail}")));
    }
    Ok(parse_status(&run.result_text, run.num_turns))
}

fn build_prompt(task: &Task, root: &Path) -> String {
    let mut prompt = format!(
        "You are working through a phased task list for the project in {}.\n\
         Complete exactly this task and nothing beyond it.\n\n\
         Task {}: {}\n",
        root.display(),
        task.id,
        task.title
    );
    if let Some(desc) = task.description.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\n{}\n", desc.trim()));
    }
    if !task.notes.is_empty() {
        prompt.push_str("\nNotes from earlier attempts:\n");
        for note in &task.notes {
            prompt.push_str(&format!("- {}\n", note.text));
        }
    }
    prompt.push_str(
        "\nEnd your reply with exactly one of these lines:\n\
         STATUS: DONE\n\
         STATUS: BLOCKED <what you need to continue>\n\
         STATUS: FAILED <what went wrong>\n",
    );
    prompt
}

fn parse_status(text: &str, turns: u32) -> ExecOutcome {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let marker = lines.last().and_then(|l| l.trim().strip_prefix("STATUS:"));
    let Some(marker) = marker else {
        return ExecOutcome::Completed {
            summary: summarize(text),
            turns,
        };
    };
    let body = lines[..lines.len() - 1].join("\n");

    let marker = marker.trim();
    let (word, rest) = marker.split_once(char::is_whitespace).unwrap_or((marker, ""));
    let reason = || {
        let r = rest.trim();
        if r.is_empty() {
            "no reason given".to_string()
        } else {
            r.to_string()
        }
    };
    match word.to_ascii_uppercase().as_str() {
        "BLOCKED" => ExecOutcome::Blocked { reason: reason() },
        "FAILED" => ExecOutcome::Failed { reason: reason() },
        _ => ExecOutcome::Completed {
            summary: summarize(&body),
            turns,
        },
    }
}

fn summarize(text: &str) -> String {
    crate::output::truncate(text.trim(), SUMMARY_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_result(text: &str) -> RunResult {
        RunResult {
            session_id: "s".into(),
            result_text: text.into(),
            total_cost_usd: 0.0,
            num_turns: 7,
            is_error: false,
            hit_turn_limit: false,
            errors: Vec::new(),
        }
    }

    #[test]
    fn done_marker() {
        let out = parse_status("Added the form.\n\nSTATUS: DONE\n", 4);
        assert_eq!(
            out,
            ExecOutcome::Completed {
                summary: "Added the form.".into(),
                turns: 4
            }
        );
    }

    #[test]
    fn blocked_and_failed_markers_carry_reasons() {
        assert_eq!(
            parse_status("Tried.\nSTATUS: BLOCKED need STRIPE_KEY", 1),
            ExecOutcome::Blocked {
                reason: "need STRIPE_KEY".into()
            }
        );
        assert_eq!(
            parse_status("STATUS: failed  tests do not compile ", 1),
            ExecOutcome::Failed {
                reason: "tests do not compile".into()
            }
        );
        assert_eq!(
            parse_status("STATUS: BLOCKED", 1),
            ExecOutcome::Blocked {
                reason: "no reason given".into()
            }
        );
    }

    #[test]
    fn missing_marker_means_done() {
        let out = parse_status("Everything is in place.", 2);
        assert!(matches!(out, ExecOutcome::Completed { turns: 2, .. }));
    }

    #[test]
    fn marker_must_be_last_line() {
        let out = parse_status("STATUS: FAILED earlier\nthen recovered", 2);
        assert!(matches!(out, ExecOutcome::Completed { .. }));
    }

    #[test]
    fn turn_limit_maps_to_turn_limit() {
        let mut r = run_result("");
        r.is_error = true;
        r.hit_turn_limit = true;
        assert_eq!(interpret(Ok(r)), Ok(ExecOutcome::TurnLimit { turns: 7 }));
    }

    #[test]
    fn error_result_is_fatal() {
        let mut r = run_result("");
        r.is_error = true;
        r.errors = vec!["tool crashed".into()];
        let err = interpret(Ok(r)).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message().contains("tool crashed"));
    }

    #[test]
    fn driver_errors_are_classified() {
        let transient = interpret(Err(ClaudeAgentError::InitTimeout {
            stderr: "Control request timeout: initialize".into(),
        }));
        assert!(transient.unwrap_err().is_transient());

        let fatal = interpret(Err(ClaudeAgentError::NoResult));
        assert!(matches!(fatal, Err(ExecError::Fatal(_))));
    }

    #[test]
    fn prompt_includes_task_and_protocol() {
        let mut task = Task::new("T3", "[AUTH-1.2] Add session handling");
        task.description = Some("Use signed cookies.".into());
        task.add_note("turn limit reached after 200 turns");
        let prompt = build_prompt(&task, Path::new("/work/app"));
        assert!(prompt.contains("/work/app"));
        assert!(prompt.contains("Task T3: [AUTH-1.2] Add session handling"));
        assert!(prompt.contains("Use signed cookies."));
        assert!(prompt.contains("- turn limit reached"));
        assert!(prompt.trim_end().ends_with("STATUS: FAILED <what went wrong>"));
    }
}
