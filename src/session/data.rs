use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::tools::ToolStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    pub id: String,
    /// RFC3339
    pub created_at: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    /// Local notes such as failed runs; never sent to the service.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SessionData {
    pub meta: SessionMeta,
    /// Last updated timestamp (RFC3339 string)
    pub timestamp: String,
    pub transcript: Vec<TranscriptEntry>,
    /// Number of runs started
    pub requests: u64,
    /// Number of tool calls resolved
    pub tool_calls: u64,
    /// Tool call success counts by tool name
    pub tool_call_successes: HashMap<String, u64>,
    /// Tool call failure counts by tool name
    pub tool_call_failures: HashMap<String, u64>,
}

impl SessionData {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            meta: SessionMeta {
                id: Uuid::now_v7().to_string(),
                created_at: now.clone(),
                thread_id: thread_id.into(),
            },
            timestamp: now,
            transcript: Vec::new(),
            requests: 0,
            tool_calls: 0,
            tool_call_successes: HashMap::new(),
            tool_call_failures: HashMap::new(),
        }
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role,
            text: text.into(),
        });
        self.touch();
    }

    pub fn increment_requests(&mut self) {
        self.requests += 1;
        self.touch();
    }

    /// Fold a dispatcher snapshot into the session counters.
    pub fn merge_tool_stats(&mut self, stats: ToolStats) {
        for (name, n) in stats.successes {
            self.tool_calls += n;
            *self.tool_call_successes.entry(name).or_insert(0) += n;
        }
        for (name, n) in stats.failures {
            self.tool_calls += n;
            *self.tool_call_failures.entry(name).or_insert(0) += n;
        }
        self.touch();
    }

    /// Tool names with their success and failure counts, sorted by name.
    pub fn tool_summary(&self) -> Vec<(String, u64, u64)> {
        let mut names: Vec<&String> = self
            .tool_call_successes
            .keys()
            .chain(self.tool_call_failures.keys())
            .collect();
        names.sort();
        names.dedup();
        names
            .into_iter()
            .map(|name| {
                (
                    name.clone(),
                    self.tool_call_successes.get(name).copied().unwrap_or(0),
                    self.tool_call_failures.get(name).copied().unwrap_or(0),
                )
            })
            .collect()
    }

    fn touch(&mut self) {
        self.timestamp = Utc::now().to_rfc3339();
    }
}
