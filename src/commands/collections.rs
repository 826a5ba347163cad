//! Collection management commands

use crate::error::Result;
use crate::meta::{Collection, CollectionStats, IngestedFile, MetaDb};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Collection information with stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub rule_set: Option<String>,
    pub tagged_at: Option<String>,
    pub stats: CollectionStats,
}

/// A collection with the files it was built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDetails {
    #[serde(flatten)]
    pub info: CollectionInfo,
    pub files: Vec<IngestedFile>,
}

async fn describe(db: &MetaDb, collection: Collection) -> Result<CollectionInfo> {
    let stats = db.get_collection_stats(&collection.id).await?;
    Ok(CollectionInfo {
        id: collection.id,
        name: collection.name,
        created_at: collection.created_at,
        updated_at: collection.updated_at,
        rule_set: collection.rule_set,
        tagged_at: collection.tagged_at,
        stats,
    })
}

pub async fn cmd_create_collection(db: &MetaDb, name: &str) -> Result<Collection> {
    db.create_collection(name).await
}

/// List all collections with their stats
pub async fn cmd_list_collections(db: &MetaDb) -> Result<Vec<CollectionInfo>> {
    info!("Listing collections");

    let collections = db.list_collections().await?;
    let mut result = Vec::with_capacity(collections.len());
    for collection in collections {
        result.push(describe(db, collection).await?);
    }
    Ok(result)
}

pub async fn cmd_show_collection(db: &MetaDb, name: &str) -> Result<CollectionDetails> {
    let collection = db.require_collection(name).await?;
    let files = db.list_ingested_files(&collection.id).await?;
    Ok(CollectionDetails {
        info: describe(db, collection).await?,
        files,
    })
}

/// Delete a collection; returns what it held
pub async fn cmd_delete_collection(db: &MetaDb, name: &str) -> Result<CollectionStats> {
    let collection = db.require_collection(name).await?;
    let stats = db.get_collection_stats(&collection.id).await?;
    db.delete_collection(&collection.id).await?;
    info!(collection = %name, "Deleted collection");
    Ok(stats)
}

/// Print collections list to console
pub fn print_collections(collections: &[CollectionInfo]) {
    println!("\n📁 Collections\n");

    if collections.is_empty() {
        println!("No collections. Use 'clickpath ingest' or 'clickpath collection create'.");
        return;
    }

    for c in collections {
        println!("• {}", c.name);
        println!(
            "  Files: {}, Clients: {}, Sessions: {}, Requests: {}",
            c.stats.file_count, c.stats.client_count, c.stats.session_count, c.stats.request_count
        );
        match (&c.rule_set, &c.tagged_at) {
            (Some(rules), Some(at)) => println!("  Tagged with '{}' at {}", rules, at),
            _ => println!("  Not tagged"),
        }
        println!();
    }
}

pub fn print_collection_details(details: &CollectionDetails) {
    print_collections(std::slice::from_ref(&details.info));

    println!("Ingested files:");
    if details.files.is_empty() {
        println!("  (none)");
    }
    for file in &details.files {
        println!(
            "  {} ({} requests, {}) {}",
            file.file_name,
            file.rows_ingested,
            file.ingested_at,
            &file.content_hash[..file.content_hash.len().min(12)]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use tempfile::TempDir;

    async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        let db = MetaDb::connect(&config).await.unwrap();
        (db, tmp)
    }

    #[tokio::test]
    async fn test_collection_commands() {
        let (db, _tmp) = setup_test_db().await;

        cmd_create_collection(&db, "march").await.unwrap();
        cmd_create_collection(&db, "april").await.unwrap();

        let listed = cmd_list_collections(&db).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["april", "march"]);
        assert_eq!(listed[0].stats.request_count, 0);

        let details = cmd_show_collection(&db, "march").await.unwrap();
        assert!(details.files.is_empty());

        cmd_delete_collection(&db, "march").await.unwrap();
        assert!(matches!(
            cmd_show_collection(&db, "march").await,
            Err(Error::CollectionNotFound(_))
        ));
    }
}
