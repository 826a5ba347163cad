//! Log normalization
//!
//! This module handles:
//! - Access log lines in a configurable Apache-style format
//! - CSV exports through a column mapping
//! - Timestamp parsing
//! - Content hashing for duplicate detection

mod csv_rows;
mod log_format;
mod timestamp;

pub use csv_rows::*;
pub use log_format::*;
pub use timestamp::*;

use crate::config::{CsvConfig, LogConfig};
use crate::error::{Error, Result};
use crate::models::Request;
use blake3::Hasher;
use tracing::debug;

/// Input kinds we can normalize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    AccessLog,
    Csv,
}

/// A normalized row: the request plus the identity it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub client_id: String,
    pub user_agent: Option<String>,
    pub request: Request,
}

/// Turns raw file content into requests
#[derive(Debug, Clone)]
pub enum Normalizer {
    AccessLog {
        format: LogFormat,
        timestamp_format: String,
    },
    Csv(CsvConfig),
}

impl Normalizer {
    pub fn access_log(config: &LogConfig) -> Result<Self> {
        Ok(Normalizer::AccessLog {
            format: LogFormat::compile(&config.format)?,
            timestamp_format: config.timestamp_format.clone(),
        })
    }

    pub fn csv(mapping: CsvConfig) -> Result<Self> {
        mapping.separator_byte()?;
        Ok(Normalizer::Csv(mapping))
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Normalizer::AccessLog { .. } => InputKind::AccessLog,
            Normalizer::Csv(_) => InputKind::Csv,
        }
    }

    /// Normalize a whole file. The first bad row aborts the file.
    pub fn normalize(&self, content: &[u8]) -> Result<Vec<ParsedRow>> {
        match self {
            Normalizer::AccessLog {
                format,
                timestamp_format,
            } => {
                let mut rows = Vec::new();
                for (i, raw) in content.split(|b| *b == b'\n').enumerate() {
                    let line = std::str::from_utf8(raw)
                        .map_err(|_| Error::parse(i + 1, "invalid UTF-8"))?
                        .trim_end_matches('\r');
                    if line.trim().is_empty() {
                        continue;
                    }
                    rows.push(format.parse_line(line, i + 1, timestamp_format)?);
                }
                debug!(rows = rows.len(), "Normalized access log");
                Ok(rows)
            }
            Normalizer::Csv(mapping) => {
                let rows = parse_csv(content, mapping)?;
                debug!(rows = rows.len(), "Normalized CSV export");
                Ok(rows)
            }
        }
    }
}

/// Compute a content hash for duplicate-file detection
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_stable() {
        let a = compute_content_hash(b"line one\nline two\n");
        let b = compute_content_hash(b"line one\nline two\n");
        let c = compute_content_hash(b"line one\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_normalize_skips_blank_lines_and_counts_rows() {
        let normalizer = Normalizer::access_log(&LogConfig::default()).unwrap();
        let content = concat!(
            r#"1.1.1.1 - - [12/Mar/2023:10:00:00 +0000] "GET /accueil/fr HTTP/1.1" 200 1 "-" "-""#,
            "\r\n\n",
            r#"1.1.1.1 - - [12/Mar/2023:10:00:10 +0000] "GET /ark:/1/f1 HTTP/1.1" 200 1 "-" "-""#,
            "\n",
            "broken line\n",
        );
        let err = normalizer.normalize(content.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 4, .. }));

        let ok = content.replace("broken line\n", "");
        let rows = normalizer.normalize(ok.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].request.url, "/ark:/1/f1");
    }

    #[test]
    fn test_normalize_rejects_invalid_utf8() {
        let normalizer = Normalizer::access_log(&LogConfig::default()).unwrap();
        let mut content = Vec::new();
        content.extend_from_slice(
            br#"1.1.1.1 - - [12/Mar/2023:10:00:00 +0000] "GET /accueil/fr HTTP/1.1" 200 1 "-" "-""#,
        );
        content.push(b'\n');
        content.extend_from_slice(br#"1.1.1.1 - - [12/Mar/2023:10:00:10 +0000] "GET /ark:/1/"#);
        content.push(0xFF);
        content.extend_from_slice(br#" HTTP/1.1" 200 1 "-" "-""#);
        content.push(b'\n');

        let err = normalizer.normalize(&content).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
        assert_eq!(normalizer.kind(), InputKind::AccessLog);
    }

    #[test]
    fn test_csv_normalizer_rejects_bad_separator() {
        let mapping = CsvConfig {
            separator: "||".to_string(),
            ..CsvConfig::default()
        };
        assert!(matches!(Normalizer::csv(mapping), Err(Error::Config(_))));
    }
}
