//! CSV exports mapped onto requests through a column mapping

use super::timestamp::parse_timestamp;
use super::ParsedRow;
use crate::config::CsvConfig;
use crate::error::{Error, Result};
use crate::models::Request;
use csv::ReaderBuilder;

/// Parse a whole CSV export. Row numbers in errors count the header as row 1.
pub fn parse_csv(content: &[u8], mapping: &CsvConfig) -> Result<Vec<ParsedRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(mapping.separator_byte()?)
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let headers = reader.headers()?.clone();
    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::parse(1, format!("missing column {:?}", name)))
    };

    let time_idx = column(&mapping.timestamp_column)?;
    let action_idx = column(&mapping.action_column)?;
    let client_idx = column(&mapping.session_id_column)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let line = i + 2;
        let record = record?;

        let field = |idx: usize, name: &str| -> Result<&str> {
            record
                .get(idx)
                .ok_or_else(|| Error::parse(line, format!("missing value for column {:?}", name)))
        };

        let client_id = field(client_idx, &mapping.session_id_column)?.trim();
        if client_id.is_empty() {
            return Err(Error::parse(line, "empty client identifier"));
        }

        let timestamp = parse_timestamp(
            field(time_idx, &mapping.timestamp_column)?,
            &mapping.timestamp_format,
        )
        .map_err(|e| Error::parse(line, e))?;

        let url = field(action_idx, &mapping.action_column)?;

        rows.push(ParsedRow {
            client_id: client_id.to_string(),
            user_agent: None,
            request: Request::new(timestamp, url),
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_default_mapping() {
        let data = "timestamp;action;client_id\n\
                    2023-05-02 10:00:00+0000;/accueil/fr;c1\n\
                    2023-05-02 10:00:05+0000;/services/engine/search/sru;c1\n";
        let rows = parse_csv(data.as_bytes(), &CsvConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].client_id, "c1");
        assert_eq!(rows[1].request.url, "/services/engine/search/sru");
        assert_eq!(
            rows[0].request.timestamp,
            Utc.with_ymd_and_hms(2023, 5, 2, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_custom_mapping_with_extra_columns() {
        let mapping = CsvConfig {
            separator: ",".to_string(),
            timestamp_column: "Time".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            action_column: "Event name".to_string(),
            session_id_column: "moodleUserId".to_string(),
        };
        let data = "Time,Component,Event name,moodleUserId\n\
                    2023-01-05 08:00:00,Forum,Course viewed,42\n";
        let rows = parse_csv(data.as_bytes(), &mapping).unwrap();
        assert_eq!(rows[0].client_id, "42");
        assert_eq!(rows[0].request.url, "Course viewed");
    }

    #[test]
    fn test_missing_column() {
        let data = "timestamp;url;client_id\n2023-05-02 10:00:00+0000;/x;c1\n";
        let err = parse_csv(data.as_bytes(), &CsvConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_short_row_and_bad_time_report_row() {
        let data = "timestamp;action;client_id\n\
                    2023-05-02 10:00:00+0000;/a;c1\n\
                    2023-05-02 10:00:00+0000;/b\n";
        let err = parse_csv(data.as_bytes(), &CsvConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));

        let data = "timestamp;action;client_id\n02/05/2023;/a;c1\n";
        let err = parse_csv(data.as_bytes(), &CsvConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }
}
