//! Default values for configuration

/// Default collection that ingest, tag and stats target
pub fn default_collection() -> String {
    "default".to_string()
}

/// Default inactivity gap that closes a session (one hour)
pub fn default_session_time_limit() -> i64 {
    3600
}

/// Default access log format (Apache combined)
pub fn default_log_format() -> String {
    r#"%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-Agent}i""#.to_string()
}

/// Default timestamp format inside `%t` brackets
pub fn default_log_timestamp_format() -> String {
    "%d/%b/%Y:%H:%M:%S %z".to_string()
}

/// Default CSV field separator
pub fn default_csv_separator() -> String {
    ";".to_string()
}

/// Default CSV timestamp column
pub fn default_csv_timestamp_column() -> String {
    "timestamp".to_string()
}

/// Default CSV timestamp format
pub fn default_csv_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S%z".to_string()
}

/// Default CSV column holding the visited URL or action
pub fn default_csv_action_column() -> String {
    "action".to_string()
}

/// Default CSV column holding the client identifier
pub fn default_csv_session_id_column() -> String {
    "client_id".to_string()
}

/// Default number of entries in top/bottom listings
pub fn default_top_n() -> usize {
    5
}

/// Default minimum support (fraction of traces) for frequent subsequences
pub fn default_min_support() -> f64 {
    0.1
}

/// Default minimum frequent subsequence length
pub fn default_min_length() -> usize {
    2
}

/// Default maximum frequent subsequence length
pub fn default_max_length() -> usize {
    5
}
