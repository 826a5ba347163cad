//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::{GlobalStats, MetaDb};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub default_collection: String,
    pub session_time_limit_secs: i64,
    pub log_format: String,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        default_collection: config.default_collection.clone(),
        session_time_limit_secs: config.session.time_limit_secs,
        log_format: config.log.format.clone(),
        db_stats: db.get_global_stats().await?,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 clickpath Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Default collection: {}", status.default_collection);
    println!("Session time limit: {}s", status.session_time_limit_secs);
    println!("Log format: {}", status.log_format);
    println!("\nDatabase Stats:");
    println!("  Collections: {}", status.db_stats.collection_count);
    println!("  Files: {}", status.db_stats.file_count);
    println!("  Clients: {}", status.db_stats.client_count);
    println!("  Sessions: {}", status.db_stats.session_count);
    println!("  Requests: {}", status.db_stats.request_count);
    println!("  Rule sets: {}", status.db_stats.rule_set_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_reports_paths_and_counts() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let db = MetaDb::connect(&config).await.unwrap();
        db.create_collection("default").await.unwrap();

        let status = cmd_status(&config, &db).await.unwrap();
        assert!(status.db_path.ends_with("clickpath.db"));
        assert_eq!(status.session_time_limit_secs, 3600);
        assert_eq!(status.db_stats.collection_count, 1);
        assert_eq!(status.db_stats.request_count, 0);
    }
}
