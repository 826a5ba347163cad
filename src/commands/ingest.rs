//! Ingest command implementation

use crate::error::{Error, Result};
use crate::meta::{AppendOutcome, MetaDb};
use crate::parse::{compute_content_hash, Normalizer};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::session::build_clients;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub collection: String,
    pub files_ingested: usize,
    /// Files whose content was already in the collection
    pub files_duplicate: usize,
    pub duplicate_files: Vec<String>,
    pub files_failed: usize,
    pub requests_ingested: usize,
    pub clients: usize,
    pub sessions: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub collection: String,
    pub time_limit_secs: i64,
}

/// Expand the given paths into regular files; directories are walked and
/// their files sorted by path
pub fn collect_input_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(e) => Some(e),
                    Err(err) => {
                        warn!("Skipping unreadable entry: {}", err);
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            return Err(Error::InvalidPath(path.display().to_string()));
        }
    }

    Ok(files)
}

/// Normalize, sessionize and store one file
async fn ingest_file(
    db: &MetaDb,
    collection_id: &str,
    normalizer: &Normalizer,
    path: &Path,
    time_limit_secs: i64,
) -> Result<AppendOutcome> {
    let file_name = path.display().to_string();
    let content = tokio::fs::read(path).await?;
    let hash = compute_content_hash(&content);

    if db.is_file_processed(collection_id, &hash).await? {
        return Err(Error::DuplicateFile {
            file: file_name,
            hash,
        });
    }

    let rows = normalizer.normalize(&content)?;
    let clients = build_clients(rows, time_limit_secs);
    debug!(file = %file_name, clients = clients.len(), "Sessionized file");

    db.append_batch(collection_id, &file_name, &hash, &clients)
        .await
}

/// Ingest a batch of files into a collection, creating it if needed.
///
/// A file is stored completely or not at all. Duplicates and failed files are
/// reported in the stats and do not stop the batch.
pub async fn cmd_ingest(
    db: &MetaDb,
    normalizer: &Normalizer,
    paths: &[PathBuf],
    options: IngestOptions,
) -> Result<IngestStats> {
    if options.time_limit_secs <= 0 {
        return Err(Error::Config(
            "session time limit must be positive".to_string(),
        ));
    }

    let files = collect_input_files(paths)?;
    if files.is_empty() {
        return Err(Error::NoData("no input files found".to_string()));
    }

    let collection = db.get_or_create_collection(&options.collection).await?;
    info!(
        collection = %collection.name,
        "Ingesting {} file(s) as {:?}",
        files.len(),
        normalizer.kind()
    );

    let mut stats = IngestStats {
        collection: collection.name.clone(),
        ..Default::default()
    };

    let progress = start_progress_bar(files.len(), "Ingesting files");

    for path in &files {
        match ingest_file(db, &collection.id, normalizer, path, options.time_limit_secs).await {
            Ok(outcome) => {
                stats.files_ingested += 1;
                stats.requests_ingested += outcome.requests;
                stats.clients += outcome.clients;
                stats.sessions += outcome.sessions;
            }
            Err(e) if e.is_informational() => {
                info!("{}", e);
                stats.files_duplicate += 1;
                stats.duplicate_files.push(path.display().to_string());
            }
            Err(e) => {
                let error_msg = format!("{}: {}", path.display(), e);
                warn!("{}", error_msg);
                stats.errors.push(error_msg);
                stats.files_failed += 1;
            }
        }

        advance_progress(&progress, &path.display().to_string());
    }

    finish_progress(progress, "Files processed");
    Ok(stats)
}

pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\n✓ Ingestion into '{}' complete", stats.collection);
    println!("  Files added: {}", stats.files_ingested);
    println!(
        "  Files already in the collection: {}",
        stats.files_duplicate
    );
    for file in &stats.duplicate_files {
        println!("    - {}", file);
    }
    if stats.files_failed > 0 {
        println!("  Files failed: {}", stats.files_failed);
        for error in &stats.errors {
            println!("    ✗ {}", error);
        }
    }
    println!("  Requests: {}", stats.requests_ingested);
    println!("  Clients: {}", stats.clients);
    println!("  Sessions: {}", stats.sessions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, CsvConfig, LogConfig};
    use tempfile::TempDir;

    const LOG: &str = concat!(
        "10.0.0.1 - - [12/Mar/2023:10:00:00 +0000] \"GET /accueil/fr HTTP/1.1\" 200 512 \"-\" \"Mozilla/5.0\"\n",
        "10.0.0.1 - - [12/Mar/2023:10:00:10 +0000] \"GET /ark:/12148/bpt6k HTTP/1.1\" 200 512 \"-\" \"Mozilla/5.0\"\n",
        "10.0.0.2 - - [12/Mar/2023:10:01:00 +0000] \"GET /blog/ HTTP/1.1\" 200 512 \"-\" \"curl/8.0\"\n",
        "10.0.0.1 - - [12/Mar/2023:11:06:50 +0000] \"GET /services/engine/search/sru HTTP/1.1\" 200 512 \"-\" \"Mozilla/5.0\"\n",
    );

    async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        let db = MetaDb::connect(&config).await.unwrap();
        (db, tmp)
    }

    fn options() -> IngestOptions {
        IngestOptions {
            collection: "logs".to_string(),
            time_limit_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_ingest_log_and_skip_duplicates() {
        let (db, tmp) = setup_test_db().await;
        let log_path = tmp.path().join("access.log");
        std::fs::write(&log_path, LOG).unwrap();
        let copy_path = tmp.path().join("copy.log");
        std::fs::write(&copy_path, LOG).unwrap();

        let normalizer = Normalizer::access_log(&LogConfig::default()).unwrap();
        let stats = cmd_ingest(&db, &normalizer, &[log_path.clone()], options())
            .await
            .unwrap();
        assert_eq!(stats.files_ingested, 1);
        assert_eq!(stats.requests_ingested, 4);
        assert_eq!(stats.clients, 2);
        // 10.0.0.1 has a gap of 3880s before its last request
        assert_eq!(stats.sessions, 3);

        let again = cmd_ingest(&db, &normalizer, &[log_path, copy_path], options())
            .await
            .unwrap();
        assert_eq!(again.files_ingested, 0);
        assert_eq!(again.files_duplicate, 2);

        let collection = db.require_collection("logs").await.unwrap();
        let counts = db.get_collection_stats(&collection.id).await.unwrap();
        assert_eq!(counts.request_count, 4);
        assert_eq!(counts.file_count, 1);

        let clients = db.load_clients(&collection.id).await.unwrap();
        assert_eq!(clients[0].user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_bad_file_is_reported_and_not_stored() {
        let (db, tmp) = setup_test_db().await;
        let dir = tmp.path().join("logs");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("a.log"), LOG).unwrap();
        let bad = dir.join("b.log");
        std::fs::write(&bad, "10.0.0.9 - - [not a time] \"GET / HTTP/1.1\" 200 1 \"-\" \"-\"\n").unwrap();

        let normalizer = Normalizer::access_log(&LogConfig::default()).unwrap();
        let stats = cmd_ingest(&db, &normalizer, &[dir], options())
            .await
            .unwrap();
        assert_eq!(stats.files_ingested, 1);
        assert_eq!(stats.files_failed, 1);
        assert!(stats.errors[0].contains("b.log"));

        let collection = db.require_collection("logs").await.unwrap();
        let counts = db.get_collection_stats(&collection.id).await.unwrap();
        assert_eq!(counts.file_count, 1);
        assert_eq!(counts.client_count, 2);
    }

    #[tokio::test]
    async fn test_ingest_csv_export() {
        let (db, tmp) = setup_test_db().await;
        let path = tmp.path().join("export.csv");
        std::fs::write(
            &path,
            "timestamp;action;client_id\n\
             2023-05-02 10:00:00+0000;/accueil/fr;c1\n\
             2023-05-02 10:00:00+0000;/accueil/fr;c1\n\
             2023-05-02 10:00:09+0000;/blog;c2\n",
        )
        .unwrap();

        let normalizer = Normalizer::csv(CsvConfig::default()).unwrap();
        let stats = cmd_ingest(&db, &normalizer, &[path], options()).await.unwrap();
        assert_eq!(stats.requests_ingested, 3);
        assert_eq!(stats.sessions, 2);
    }

    #[tokio::test]
    async fn test_missing_path_and_bad_limit() {
        let (db, tmp) = setup_test_db().await;
        let normalizer = Normalizer::access_log(&LogConfig::default()).unwrap();

        let missing = tmp.path().join("nope.log");
        assert!(matches!(
            cmd_ingest(&db, &normalizer, &[missing], options()).await,
            Err(Error::InvalidPath(_))
        ));

        let mut opts = options();
        opts.time_limit_secs = 0;
        assert!(matches!(
            cmd_ingest(&db, &normalizer, &[tmp.path().to_path_buf()], opts).await,
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_collect_input_files_sorts_directory_entries() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("b.log"), "").unwrap();
        std::fs::write(tmp.path().join("a.log"), "").unwrap();
        std::fs::write(tmp.path().join("sub").join("c.log"), "").unwrap();

        let files = collect_input_files(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.log", "b.log", "sub/c.log"]);
    }
}
