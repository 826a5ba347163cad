//! Core domain records: requests, sessions, clients and the built-in action tags

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tag assigned to requests no rule recognises; never part of a trace
pub const OUTLIERS: &str = "Outliers";

/// One normalized access-log hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub referer: Option<String>,
    pub response_code: Option<u16>,
    /// Set by the tagging engine, once per tagging pass
    pub action_tag: Option<String>,
}

impl Request {
    pub fn new(timestamp: DateTime<Utc>, url: impl Into<String>) -> Self {
        Self {
            timestamp,
            url: url.into(),
            referer: None,
            response_code: None,
            action_tag: None,
        }
    }

    pub fn is_outlier(&self) -> bool {
        self.action_tag.as_deref() == Some(OUTLIERS)
    }
}

/// A run of requests by one client with no gap above the session time limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// 0-based position among the client's sessions
    pub session_index: usize,
    pub requests: Vec<Request>,
}

impl Session {
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.requests.iter().map(|r| r.timestamp).min()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.requests.iter().map(|r| r.timestamp).max()
    }

    /// Seconds between the earliest and latest request
    pub fn duration_secs(&self) -> i64 {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => (last - first).num_seconds(),
            _ => 0,
        }
    }
}

/// A visitor identified by an opaque client id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub user_agent: Option<String>,
    pub sessions: Vec<Session>,
}

impl Client {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            country: None,
            city: None,
            user_agent: None,
            sessions: Vec::new(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.sessions.iter().map(|s| s.requests.len()).sum()
    }
}

/// The built-in action vocabulary, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionTag {
    HomePage,
    CollectionNavigation,
    DownloadRessource,
    ViewingRessource,
    GallicaSearchEngine,
    AdvancedSearch,
    AccessGallicaBlog,
    OCRTextExtraction,
    ResearchReportExtraction,
    Outliers,
}

impl ActionTag {
    pub const ALL: [ActionTag; 10] = [
        ActionTag::HomePage,
        ActionTag::CollectionNavigation,
        ActionTag::DownloadRessource,
        ActionTag::ViewingRessource,
        ActionTag::GallicaSearchEngine,
        ActionTag::AdvancedSearch,
        ActionTag::AccessGallicaBlog,
        ActionTag::OCRTextExtraction,
        ActionTag::ResearchReportExtraction,
        ActionTag::Outliers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTag::HomePage => "HomePage",
            ActionTag::CollectionNavigation => "CollectionNavigation",
            ActionTag::DownloadRessource => "DownloadRessource",
            ActionTag::ViewingRessource => "ViewingRessource",
            ActionTag::GallicaSearchEngine => "GallicaSearchEngine",
            ActionTag::AdvancedSearch => "AdvancedSearch",
            ActionTag::AccessGallicaBlog => "AccessGallicaBlog",
            ActionTag::OCRTextExtraction => "OCRTextExtraction",
            ActionTag::ResearchReportExtraction => "ResearchReportExtraction",
            ActionTag::Outliers => OUTLIERS,
        }
    }
}

impl std::fmt::Display for ActionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ActionTag::ALL
            .iter()
            .find(|tag| tag.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Other(format!("Unknown action tag: {}", s)))
    }
}
