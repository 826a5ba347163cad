//! Usage statistics over traces, actions and sessions
//!
//! Popularity maps keep first-seen order so that top/bottom listings break
//! ties deterministically.

use crate::error::{Error, Result};
use crate::models::Client;
use crate::trace::Trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Insertion-ordered occurrence counter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Popularity {
    entries: Vec<(String, usize)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Popularity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    pub fn get(&self, key: &str) -> usize {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    /// Entries in first-seen order
    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// The `n` highest counts; ties keep first-seen order
    pub fn most_popular(&self, n: usize) -> Vec<(String, usize)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.truncate(n);
        sorted
    }

    /// The `n` lowest counts; ties keep first-seen order
    pub fn least_popular(&self, n: usize) -> Vec<(String, usize)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| a.1.cmp(&b.1));
        sorted.truncate(n);
        sorted
    }
}

impl<'a> FromIterator<&'a str> for Popularity {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut popularity = Popularity::new();
        for key in iter {
            popularity.add(key);
        }
        popularity
    }
}

/// Total and distinct counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uniqueness {
    pub total: usize,
    pub unique: usize,
}

impl Uniqueness {
    /// `total / unique`
    pub fn average(&self) -> Result<f64> {
        if self.unique == 0 {
            return Err(Error::DivideByZero(
                "average needs at least one distinct value".to_string(),
            ));
        }
        Ok(self.total as f64 / self.unique as f64)
    }
}

/// Total, unique and average in one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub total: usize,
    pub unique: usize,
    pub average: f64,
}

impl StatSummary {
    pub fn from_uniqueness(u: Uniqueness) -> Result<Self> {
        Ok(Self {
            total: u.total,
            unique: u.unique,
            average: u.average()?,
        })
    }
}

/// How often each distinct tag sequence occurs, clients ignored
pub fn trace_popularity(traces: &[Trace]) -> Popularity {
    let mut popularity = Popularity::new();
    for trace in traces {
        popularity.add(&trace.sequence_key());
    }
    popularity
}

/// How often each individual action occurs across all traces
pub fn action_popularity(traces: &[Trace]) -> Popularity {
    traces
        .iter()
        .flat_map(|t| t.tags.iter().map(String::as_str))
        .collect()
}

pub fn trace_uniqueness(traces: &[Trace]) -> Uniqueness {
    Uniqueness {
        total: traces.len(),
        unique: trace_popularity(traces).len(),
    }
}

pub fn action_uniqueness(traces: &[Trace]) -> Uniqueness {
    let popularity = action_popularity(traces);
    Uniqueness {
        total: popularity.total(),
        unique: popularity.len(),
    }
}

/// `total_traces / unique_traces`
pub fn trace_average(traces: &[Trace]) -> Result<f64> {
    trace_uniqueness(traces).average()
}

/// `total_actions / unique_actions`
pub fn action_average(traces: &[Trace]) -> Result<f64> {
    action_uniqueness(traces).average()
}

/// Sum of trace lengths
pub fn action_number(traces: &[Trace]) -> usize {
    traces.iter().map(Trace::len).sum()
}

/// Requests per tag over every request, `Outliers` included
pub fn tag_counts(clients: &[Client]) -> Popularity {
    clients
        .iter()
        .flat_map(|c| c.sessions.iter())
        .flat_map(|s| s.requests.iter())
        .filter_map(|r| r.action_tag.as_deref())
        .collect()
}

/// Session-level figures for one client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSessionStats {
    pub client_id: String,
    pub sessions_count: usize,
    pub requests_per_session: Vec<usize>,
    /// Seconds between first and last request of each session
    pub session_durations: Vec<i64>,
    /// Occurrences of each trace action, first-seen order
    pub action_frequency: Vec<(String, usize)>,
}

pub fn session_stats(clients: &[Client]) -> Vec<ClientSessionStats> {
    clients
        .iter()
        .map(|c| ClientSessionStats {
            client_id: c.client_id.clone(),
            sessions_count: c.sessions.len(),
            requests_per_session: c.sessions.iter().map(|s| s.requests.len()).collect(),
            session_durations: c.sessions.iter().map(|s| s.duration_secs()).collect(),
            action_frequency: c
                .sessions
                .iter()
                .flat_map(|s| s.requests.iter())
                .filter(|r| !r.is_outlier())
                .filter_map(|r| r.action_tag.as_deref())
                .collect::<Popularity>()
                .entries()
                .to_vec(),
        })
        .collect()
}

/// Collection-wide session figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOverview {
    pub clients: usize,
    pub sessions: usize,
    pub requests: usize,
    pub mean_requests_per_session: f64,
    pub mean_session_duration_secs: f64,
}

pub fn session_overview(clients: &[Client]) -> Result<SessionOverview> {
    let sessions: Vec<_> = clients.iter().flat_map(|c| c.sessions.iter()).collect();
    if sessions.is_empty() {
        return Err(Error::DivideByZero(
            "session means need at least one session".to_string(),
        ));
    }

    let requests: usize = sessions.iter().map(|s| s.requests.len()).sum();
    let duration: i64 = sessions.iter().map(|s| s.duration_secs()).sum();

    Ok(SessionOverview {
        clients: clients.len(),
        sessions: sessions.len(),
        requests,
        mean_requests_per_session: requests as f64 / sessions.len() as f64,
        mean_session_duration_secs: duration as f64 / sessions.len() as f64,
    })
}
