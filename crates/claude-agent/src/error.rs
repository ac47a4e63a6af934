use thiserror::Error;

/// Marker the CLI prints on stderr when its control handshake never completes.
pub(crate) const INIT_TIMEOUT_MARKER: &str = "Control request timeout: initialize";

#[derive(Debug, Error)]
pub enum ClaudeAgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse stream-json line: {source}\n  line: {line}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The subprocess timed out during its initialize handshake. Usually
    /// succeeds on a second attempt.
    #[error("claude timed out while initializing\nstderr: {stderr}")]
    InitTimeout { stderr: String },

    #[error("claude process error: {0}")]
    Process(String),

    #[error("stream ended without a result message")]
    NoResult,
}

impl ClaudeAgentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClaudeAgentError::InitTimeout { .. })
    }

    /// Classify a non-zero exit from its captured stderr.
    pub(crate) fn from_exit(summary: String, stderr: String) -> Self {
        if stderr.contains(INIT_TIMEOUT_MARKER) {
            return ClaudeAgentError::InitTimeout { stderr };
        }
        if stderr.is_empty() {
            ClaudeAgentError::Process(summary)
        } else {
            ClaudeAgentError::Process(format!("{summary}\nstderr: {stderr}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_timeout_is_transient() {
        let err = ClaudeAgentError::from_exit(
            "exited with code 1".into(),
            "Error: Control request timeout: initialize".into(),
        );
        assert!(err.is_transient());
        assert!(matches!(err, ClaudeAgentError::InitTimeout { .. }));
    }

    #[test]
    fn other_exits_are_not_transient() {
        let err = ClaudeAgentError::from_exit("exited with code 2".into(), "auth failed".into());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "claude process error: exited with code 2\nstderr: auth failed"
        );

        let bare = ClaudeAgentError::from_exit("terminated by signal".into(), String::new());
        assert_eq!(bare.to_string(), "claude process error: terminated by signal");
    }
}
