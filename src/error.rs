//! Custom error types for clickpath

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A log line or CSV row could not be normalized
    #[error("Parse error at row {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("No rules configured")]
    EmptyVocabulary,

    #[error("File {file} already in the collection (hash {hash})")]
    DuplicateFile { file: String, hash: String },

    #[error("Division by zero: {0}")]
    DivideByZero(String),

    #[error("Encoding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: String, right: String },

    #[error("Metric {metric} does not apply to {representation} vectors")]
    UnsupportedMetric {
        metric: String,
        representation: String,
    },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Rule set not found: {0}")]
    RuleSetNotFound(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Tag not in vocabulary: {0}")]
    UnknownTag(String),

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not initialized: run 'clickpath init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a parse error for a 1-based row number
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    /// Informational errors that callers report rather than abort on
    pub fn is_informational(&self) -> bool {
        matches!(self, Error::DuplicateFile { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
