//! Title parsing: maps a task title to the ordering key embedded in it.
//!
//! Recognized markers are tried in a fixed order and the first rule that
//! matches decides the key, even when a later rule would also match. A rule
//! that matches but carries numbers that are not non-negative integers
//! degrades straight to [`TaskKey::Unordered`].

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Stand-in for an unbounded phase or subtask.
pub const UNORDERED: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// TaskKey
// ---------------------------------------------------------------------------

/// Ordering key derived from a title.
///
/// The derived `Ord` follows declaration order, so `Meta` sorts before every
/// ordered key, ordered keys compare by `(phase, subtask)`, tickets follow all
/// phased work by number, and unordered titles come last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKey {
    Meta,
    Ordered { phase: u32, subtask: u32 },
    Ticket { number: u32 },
    Unordered,
}

impl TaskKey {
    pub fn phase(self) -> u32 {
        match self {
            TaskKey::Meta => 0,
            TaskKey::Ordered { phase, .. } => phase,
            TaskKey::Ticket { .. } | TaskKey::Unordered => UNORDERED,
        }
    }

    pub fn subtask(self) -> u32 {
        match self {
            TaskKey::Meta => 0,
            TaskKey::Ordered { subtask, .. } => subtask,
            TaskKey::Ticket { number } => number,
            TaskKey::Unordered => UNORDERED,
        }
    }

    /// Phased and ticket keys take part in the completion barrier; META and
    /// the `(∞, ∞)` sentinel do not.
    pub fn is_gated(self) -> bool {
        matches!(self, TaskKey::Ordered { .. } | TaskKey::Ticket { .. })
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Meta => f.write_str("META"),
            TaskKey::Ordered { phase, subtask } => write!(f, "{phase}.{subtask}"),
            TaskKey::Ticket { number } => write!(f, "∞.{number}"),
            TaskKey::Unordered => f.write_str("∞.∞"),
        }
    }
}

// ---------------------------------------------------------------------------
// TitleRule
// ---------------------------------------------------------------------------

/// A fn-pointer matcher. `None` means "not my pattern, try the next rule".
pub struct TitleRule {
    pub id: &'static str,
    pub try_parse: fn(&str) -> Option<TaskKey>,
}

static RULES: [TitleRule; 6] = [
    TitleRule {
        id: "meta",
        try_parse: parse_meta,
    },
    TitleRule {
        id: "bracket_tag",
        try_parse: parse_bracket_tag,
    },
    TitleRule {
        id: "leading_number",
        try_parse: parse_leading_number,
    },
    TitleRule {
        id: "phase_word",
        try_parse: parse_phase_word,
    },
    TitleRule {
        id: "task_word",
        try_parse: parse_task_word,
    },
    TitleRule {
        id: "ticket_id",
        try_parse: parse_ticket_id,
    },
];

pub fn default_rules() -> &'static [TitleRule] {
    &RULES
}

/// Parse `title` with the default rule set.
pub fn parse(title: &str) -> TaskKey {
    explain(title).0
}

/// Parse `title` and report which rule produced the key (`None` when no rule
/// matched).
pub fn explain(title: &str) -> (TaskKey, Option<&'static str>) {
    parse_with(default_rules(), title)
}

pub fn parse_with(rules: &[TitleRule], title: &str) -> (TaskKey, Option<&'static str>) {
    rules
        .iter()
        .find_map(|rule| (rule.try_parse)(title).map(|key| (key, Some(rule.id))))
        .unwrap_or((TaskKey::Unordered, None))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

static META_RE: OnceLock<Regex> = OnceLock::new();
static BRACKET_RE: OnceLock<Regex> = OnceLock::new();
static LEADING_RE: OnceLock<Regex> = OnceLock::new();
static PHASE_RE: OnceLock<Regex> = OnceLock::new();
static TASK_RE: OnceLock<Regex> = OnceLock::new();
static TICKET_RE: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

fn parse_meta(title: &str) -> Option<TaskKey> {
    compiled(&META_RE, r"(?i)^\s*meta\b")
        .is_match(title)
        .then_some(TaskKey::Meta)
}

fn parse_bracket_tag(title: &str) -> Option<TaskKey> {
    compiled(
        &BRACKET_RE,
        r"^\s*\[\s*[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*?\s*-(-?\d+)\.(-?\d+)\s*\]",
    )
    .captures(title)
    .map(|caps| ordered(&caps))
}

fn parse_leading_number(title: &str) -> Option<TaskKey> {
    compiled(&LEADING_RE, r"^\s*(-?\d+)\.(-?\d+)\s*:")
        .captures(title)
        .map(|caps| ordered(&caps))
}

fn parse_phase_word(title: &str) -> Option<TaskKey> {
    compiled(&PHASE_RE, r"(?i)\bphase\s+(-?\d+)\.(-?\d+)")
        .captures(title)
        .map(|caps| ordered(&caps))
}

fn parse_task_word(title: &str) -> Option<TaskKey> {
    compiled(&TASK_RE, r"(?i)\btask\s+(-?\d+)\.(-?\d+)")
        .captures(title)
        .map(|caps| ordered(&caps))
}

fn parse_ticket_id(title: &str) -> Option<TaskKey> {
    compiled(
        &TICKET_RE,
        r"^\s*\[?\s*[A-Z][A-Z0-9]*-(\d+)\s*(?:\]|:|\s|$)",
    )
    .captures(title)
    .map(|caps| match ordinal(&caps[1]) {
        Some(number) => TaskKey::Ticket { number },
        None => TaskKey::Unordered,
    })
}

fn ordered(caps: &Captures<'_>) -> TaskKey {
    match (ordinal(&caps[1]), ordinal(&caps[2])) {
        (Some(phase), Some(subtask)) => TaskKey::Ordered { phase, subtask },
        _ => TaskKey::Unordered,
    }
}

/// A non-negative integer strictly below the sentinel.
fn ordinal(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|n| *n < UNORDERED)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
