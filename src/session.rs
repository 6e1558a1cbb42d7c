//! Session-scoped state: the uploaded dataset, the conversation, and the
//! interaction log. Created at session start, passed by reference into the
//! orchestrator, destroyed at session end. Rounds are strictly sequential,
//! so plain `&mut` access is enough.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::chart::ResolvedChart;
use crate::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation. Charts only ever attach to assistant turns.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub charts: Vec<ResolvedChart>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            charts: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, charts: Vec<ResolvedChart>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            charts,
        }
    }
}

/// Immutable record of one orchestration round, chart outcome or not.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub response: String,
    /// One JSON value per extracted directive: the parsed object, or the
    /// raw span as a string when it did not parse. A single value, an
    /// array when the response carried several, or null when none.
    pub directives: Option<Value>,
}

impl LogEntry {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>, directives: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            prompt: prompt.into(),
            response: response.into(),
            directives,
        }
    }
}

/// Append-only record of every round. `clear` removes all entries at once;
/// nothing else ever mutates or removes an entry.
#[derive(Debug, Default)]
pub struct InteractionLog {
    entries: Vec<LogEntry>,
}

impl InteractionLog {
    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn read_all(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct Session {
    pub dataset: Dataset,
    conversation: Vec<ChatTurn>,
    pub log: InteractionLog,
}

impl Session {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            conversation: Vec::new(),
            log: InteractionLog::default(),
        }
    }

    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.conversation.push(turn);
    }

    pub fn conversation(&self) -> &[ChatTurn] {
        &self.conversation
    }
}
