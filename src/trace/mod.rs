//! Traces: per-session tag sequences and their `client;tag,tag` wire form

use crate::error::{Error, Result};
use crate::models::{Client, Session, OUTLIERS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The behavioral trace of one session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trace {
    pub client_id: String,
    pub tags: Vec<String>,
}

impl Trace {
    /// Derive a trace, dropping `Outliers` and untagged requests.
    ///
    /// Returns `None` when nothing is left.
    pub fn from_session(client_id: &str, session: &Session) -> Option<Self> {
        let tags: Vec<String> = session
            .requests
            .iter()
            .filter_map(|r| r.action_tag.as_deref())
            .filter(|tag| *tag != OUTLIERS)
            .map(str::to_string)
            .collect();

        if tags.is_empty() {
            None
        } else {
            Some(Self {
                client_id: client_id.to_string(),
                tags,
            })
        }
    }

    /// Tag sequence without the client, the identity used by popularity
    pub fn sequence_key(&self) -> String {
        self.tags.join(",")
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// `client_id;tag1,...,tagN`
    pub fn to_wire(&self) -> Result<String> {
        if self.client_id.contains(';') {
            return Err(Error::InvalidTrace(format!(
                "client id {:?} contains ';'",
                self.client_id
            )));
        }
        Ok(format!("{};{}", self.client_id, self.sequence_key()))
    }

    /// Parse one wire line; `line` is 1-based and only used in errors
    pub fn parse_wire(text: &str, line: usize) -> Result<Self> {
        let (client_id, sequence) = text
            .trim()
            .split_once(';')
            .ok_or_else(|| Error::parse(line, "trace is missing ';'"))?;

        if client_id.is_empty() {
            return Err(Error::parse(line, "trace has an empty client id"));
        }

        let tags: Vec<String> = sequence.split(',').map(|t| t.trim().to_string()).collect();
        if tags.iter().any(|t| t.is_empty()) {
            return Err(Error::parse(line, "trace has an empty tag"));
        }

        Ok(Self {
            client_id: client_id.to_string(),
            tags,
        })
    }
}

impl std::str::FromStr for Trace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Trace::parse_wire(s, 1)
    }
}

/// Traces for every non-empty session, clients and sessions in order
pub fn build_traces(clients: &[Client]) -> Vec<Trace> {
    clients
        .iter()
        .flat_map(|client| {
            client
                .sessions
                .iter()
                .filter_map(move |s| Trace::from_session(&client.client_id, s))
        })
        .collect()
}

/// Traces of a single client
pub fn client_traces(clients: &[Client], client_id: &str) -> Vec<Trace> {
    clients
        .iter()
        .filter(|c| c.client_id == client_id)
        .flat_map(|c| {
            c.sessions
                .iter()
                .filter_map(move |s| Trace::from_session(&c.client_id, s))
        })
        .collect()
}

/// Read wire-format lines, skipping blanks
pub fn read_traces(text: &str) -> Result<Vec<Trace>> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| Trace::parse_wire(l, i + 1))
        .collect()
}

/// One event row for process-mining collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub client_id: String,
    pub session_index: usize,
    /// The tag when set, otherwise the raw URL
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Flatten every request into event rows in session order
pub fn event_rows(clients: &[Client]) -> Vec<EventRecord> {
    let mut rows = Vec::new();
    for client in clients {
        for session in &client.sessions {
            for request in &session.requests {
                rows.push(EventRecord {
                    client_id: client.client_id.clone(),
                    session_index: session.session_index,
                    action: request
                        .action_tag
                        .clone()
                        .unwrap_or_else(|| request.url.clone()),
                    timestamp: request.timestamp,
                });
            }
        }
    }
    rows
}
