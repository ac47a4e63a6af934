//! Contract between the execution loop and whatever performs a task.
//!
//! Adapters classify their own failures into [`ExecError::Transient`] or
//! [`ExecError::Fatal`]; the loop never inspects error text.

use crate::task::Task;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub task: &'a Task,
    /// 1-indexed; greater than 1 only when retrying a transient failure.
    pub attempt: u32,
    pub max_turns: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Completed { summary: String, turns: u32 },
    Blocked { reason: String },
    Failed { reason: String },
    /// The executor ran out of turns before reaching an outcome.
    TurnLimit { turns: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    /// Worth one more try (e.g. the session timed out while initializing).
    #[error("transient executor failure: {0}")]
    Transient(String),

    #[error("executor failure: {0}")]
    Fatal(String),
}

impl ExecError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ExecError::Transient(m) | ExecError::Fatal(m) => m,
        }
    }
}

pub trait TaskExecutor {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, ExecError>;
}

impl<F> TaskExecutor for F
where
    F: FnMut(&ExecRequest<'_>) -> Result<ExecOutcome, ExecError>,
{
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, ExecError> {
        self(request)
    }
}
