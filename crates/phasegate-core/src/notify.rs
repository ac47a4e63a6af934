//! Progress notifications. Sinks are fire-and-forget from the loop's point of
//! view: an `Err` is logged and dropped, never propagated.

use crate::error::{PhasegateError, Result};
use crate::types::TaskStatus;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        project: String,
        todo: usize,
    },
    TaskStarted {
        id: String,
        title: String,
        attempt: u32,
    },
    TaskResolved {
        id: String,
        title: String,
        status: TaskStatus,
        detail: Option<String>,
    },
    SessionHalted {
        reason: String,
        executed: usize,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::SessionStarted { project, todo } => {
                write!(f, "[{project}] session started: {todo} task(s) to do")
            }
            Event::TaskStarted { id, title, attempt } if *attempt > 1 => {
                write!(f, "retrying {id} (attempt {attempt}): {title}")
            }
            Event::TaskStarted { id, title, .. } => write!(f, "started {id}: {title}"),
            Event::TaskResolved {
                id,
                title,
                status,
                detail,
            } => match detail {
                Some(d) => write!(f, "{id} {status}: {title} ({d})"),
                None => write!(f, "{id} {status}: {title}"),
            },
            Event::SessionHalted { reason, executed } => {
                write!(f, "session halted after {executed} task(s): {reason}")
            }
        }
    }
}

pub trait NotificationSink {
    fn notify(&self, event: &Event) -> Result<()>;
}

// ---------------------------------------------------------------------------
// LogSink
// ---------------------------------------------------------------------------

/// Emits each event as a tracing `info!` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: &Event) -> Result<()> {
        tracing::info!(target: "phasegate::notify", "{event}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookSink
// ---------------------------------------------------------------------------

/// Posts `{"text": "<event>"}` to a chat webhook (Slack/Discord style).
pub struct WebhookSink {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PhasegateError::Notify(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl NotificationSink for WebhookSink {
    fn notify(&self, event: &Event) -> Result<()> {
        let body = serde_json::json!({ "text": event.to_string() });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| PhasegateError::Notify(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PhasegateError::Notify(format!(
                "webhook returned HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FanoutSink
// ---------------------------------------------------------------------------

/// Delivers to every inner sink; one failing sink does not starve the others.
/// An empty fan-out is a no-op sink.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, event: &Event) -> Result<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.notify(event) {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PhasegateError::Notify(failures.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
