//! Collection storage using SQLite
//!
//! This module handles all persistent state:
//! - Collections (named groups of ingested logs)
//! - Ingested files (content hashes for duplicate detection)
//! - Clients, sessions and requests (the sessionized, optionally tagged logs)
//! - Rule sets (named tagging cascades)

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Client, Request, Session};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// A named collection of ingested logs
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    /// Rule set applied by the last tagging pass
    pub rule_set: Option<String>,
    pub tagged_at: Option<String>,
    /// JSON array of the trace tags that rule set could produce when it ran
    pub tag_vocabulary: Option<String>,
}

impl Collection {
    pub fn new(name: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now.clone(),
            updated_at: now,
            rule_set: None,
            tagged_at: None,
            tag_vocabulary: None,
        }
    }

    /// Trace tags recorded by the last tagging pass
    pub fn tag_vocabulary(&self) -> Result<Option<Vec<String>>> {
        match &self.tag_vocabulary {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }
}

/// A processed input file
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IngestedFile {
    pub collection_id: String,
    pub content_hash: String,
    pub file_name: String,
    pub rows_ingested: i64,
    pub ingested_at: String,
}

/// A stored tagging cascade
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoredRuleSet {
    pub name: String,
    pub rules_json: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, FromRow)]
struct ClientRow {
    id: i64,
    client_id: String,
    country: Option<String>,
    city: Option<String>,
    user_agent: Option<String>,
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: i64,
    client_row_id: i64,
    session_index: i64,
}

#[derive(Debug, FromRow)]
struct RequestRow {
    session_id: i64,
    timestamp: String,
    url: String,
    referer: Option<String>,
    response_code: Option<i64>,
    action_tag: Option<String>,
}

impl RequestRow {
    fn into_request(self) -> Result<Request> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| {
                Error::Other(format!(
                    "Stored timestamp {:?} is not RFC 3339: {}",
                    self.timestamp, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Request {
            timestamp,
            url: self.url,
            referer: self.referer,
            response_code: self.response_code.and_then(|c| u16::try_from(c).ok()),
            action_tag: self.action_tag,
        })
    }
}

/// Result of appending one file's clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppendOutcome {
    pub clients: usize,
    pub sessions: usize,
    pub requests: usize,
}

/// Statistics for a single collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub file_count: usize,
    pub client_count: usize,
    pub session_count: usize,
    pub request_count: usize,
    pub tagged_request_count: usize,
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub collection_count: usize,
    pub file_count: usize,
    pub client_count: usize,
    pub session_count: usize,
    pub request_count: usize,
    pub rule_set_count: usize,
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Insert one client's sessions. With `append`, session indices continue
/// after the ones already stored for the client.
///
/// The client row is created if missing; a known user agent is never
/// overwritten.
async fn insert_client(
    conn: &mut SqliteConnection,
    collection_id: &str,
    client: &Client,
    append: bool,
) -> Result<AppendOutcome> {
    sqlx::query(
        r#"
        INSERT INTO clients (collection_id, client_id, country, city, user_agent)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(collection_id, client_id) DO UPDATE SET
            country = COALESCE(clients.country, excluded.country),
            city = COALESCE(clients.city, excluded.city),
            user_agent = COALESCE(clients.user_agent, excluded.user_agent)
        "#,
    )
    .bind(collection_id)
    .bind(&client.client_id)
    .bind(&client.country)
    .bind(&client.city)
    .bind(&client.user_agent)
    .execute(&mut *conn)
    .await?;

    let client_row_id: i64 =
        sqlx::query_scalar("SELECT id FROM clients WHERE collection_id = ? AND client_id = ?")
            .bind(collection_id)
            .bind(&client.client_id)
            .fetch_one(&mut *conn)
            .await?;

    let offset: i64 = if append {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(session_index) + 1, 0) FROM sessions WHERE client_row_id = ?",
        )
        .bind(client_row_id)
        .fetch_one(&mut *conn)
        .await?
    } else {
        0
    };

    let mut outcome = AppendOutcome {
        clients: 1,
        ..Default::default()
    };

    for session in &client.sessions {
        let session_id = sqlx::query(
            "INSERT INTO sessions (client_row_id, session_index) VALUES (?, ?)",
        )
        .bind(client_row_id)
        .bind(offset + session.session_index as i64)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        for (position, request) in session.requests.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO requests (session_id, position, timestamp, url, referer, response_code, action_tag)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session_id)
            .bind(position as i64)
            .bind(format_timestamp(&request.timestamp))
            .bind(&request.url)
            .bind(&request.referer)
            .bind(request.response_code.map(i64::from))
            .bind(&request.action_tag)
            .execute(&mut *conn)
            .await?;
        }

        outcome.sessions += 1;
        outcome.requests += session.requests.len();
    }

    Ok(outcome)
}

async fn delete_collection_rows(conn: &mut SqliteConnection, collection_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM requests WHERE session_id IN (
            SELECT s.id FROM sessions s
            JOIN clients c ON s.client_row_id = c.id
            WHERE c.collection_id = ?
        )
        "#,
    )
    .bind(collection_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "DELETE FROM sessions WHERE client_row_id IN (SELECT id FROM clients WHERE collection_id = ?)",
    )
    .bind(collection_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM clients WHERE collection_id = ?")
        .bind(collection_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the database named in the configuration
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open (and create if needed) the database at `db_path`
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='collections'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    // ===== Collection Operations =====

    /// Create a collection; fails if the name is taken
    pub async fn create_collection(&self, name: &str) -> Result<Collection> {
        if self.get_collection(name).await?.is_some() {
            return Err(Error::Config(format!("Collection '{}' already exists", name)));
        }

        let collection = Collection::new(name);
        sqlx::query(
            r#"
            INSERT INTO collections (id, name, created_at, updated_at, rule_set, tagged_at, tag_vocabulary)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&collection.id)
        .bind(&collection.name)
        .bind(&collection.created_at)
        .bind(&collection.updated_at)
        .bind(&collection.rule_set)
        .bind(&collection.tagged_at)
        .bind(&collection.tag_vocabulary)
        .execute(&self.pool)
        .await?;

        info!(collection = %name, "Created collection");
        Ok(collection)
    }

    /// Get collection by name
    pub async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        let collection =
            sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(collection)
    }

    /// Get collection by name or fail with `CollectionNotFound`
    pub async fn require_collection(&self, name: &str) -> Result<Collection> {
        self.get_collection(name)
            .await?
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    pub async fn get_or_create_collection(&self, name: &str) -> Result<Collection> {
        match self.get_collection(name).await? {
            Some(collection) => Ok(collection),
            None => self.create_collection(name).await,
        }
    }

    /// List all collections
    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        let collections =
            sqlx::query_as::<_, Collection>("SELECT * FROM collections ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(collections)
    }

    /// Delete a collection with its clients, sessions, requests and file records
    pub async fn delete_collection(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        delete_collection_rows(&mut tx, id).await?;

        sqlx::query("DELETE FROM ingested_files WHERE collection_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ===== Ingestion Operations =====

    /// Whether a file with this content hash was already ingested into the collection
    pub async fn is_file_processed(&self, collection_id: &str, content_hash: &str) -> Result<bool> {
        let found: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM ingested_files WHERE collection_id = ? AND content_hash = ?",
        )
        .bind(collection_id)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// List ingested files for a collection
    pub async fn list_ingested_files(&self, collection_id: &str) -> Result<Vec<IngestedFile>> {
        let files = sqlx::query_as::<_, IngestedFile>(
            "SELECT * FROM ingested_files WHERE collection_id = ? ORDER BY ingested_at",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    /// Append one file's sessionized clients and record its hash, atomically.
    ///
    /// Sessions of a client already in the collection are numbered after its
    /// existing ones. Fails with `DuplicateFile` if the hash is already recorded.
    pub async fn append_batch(
        &self,
        collection_id: &str,
        file_name: &str,
        content_hash: &str,
        clients: &[Client],
    ) -> Result<AppendOutcome> {
        let mut tx = self.pool.begin().await?;

        let found: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM ingested_files WHERE collection_id = ? AND content_hash = ?",
        )
        .bind(collection_id)
        .bind(content_hash)
        .fetch_optional(&mut *tx)
        .await?;
        if found.is_some() {
            tx.rollback().await?;
            return Err(Error::DuplicateFile {
                file: file_name.to_string(),
                hash: content_hash.to_string(),
            });
        }

        let mut total = AppendOutcome::default();
        for client in clients {
            let outcome = insert_client(&mut tx, collection_id, client, true).await?;
            total.clients += outcome.clients;
            total.sessions += outcome.sessions;
            total.requests += outcome.requests;
        }

        sqlx::query(
            r#"
            INSERT INTO ingested_files (collection_id, content_hash, file_name, rows_ingested, ingested_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(collection_id)
        .bind(content_hash)
        .bind(file_name)
        .bind(total.requests as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE collections SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            file = %file_name,
            clients = total.clients,
            sessions = total.sessions,
            requests = total.requests,
            "Appended batch"
        );
        Ok(total)
    }

    /// Replace every client of the collection in a single transaction.
    ///
    /// Readers see either the old or the new rows, never a mix. `tagging`
    /// names the rule set that produced the tags and its trace vocabulary.
    pub async fn replace_clients(
        &self,
        collection_id: &str,
        clients: &[Client],
        tagging: Option<(&str, &[String])>,
    ) -> Result<AppendOutcome> {
        let vocabulary = tagging
            .map(|(_, tags)| serde_json::to_string(tags))
            .transpose()?;
        let rule_set = tagging.map(|(name, _)| name);

        let mut tx = self.pool.begin().await?;

        delete_collection_rows(&mut tx, collection_id).await?;

        let mut total = AppendOutcome::default();
        for client in clients {
            let outcome = insert_client(&mut tx, collection_id, client, false).await?;
            total.clients += outcome.clients;
            total.sessions += outcome.sessions;
            total.requests += outcome.requests;
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE collections SET rule_set = ?, tagged_at = ?, tag_vocabulary = ?, updated_at = ? WHERE id = ?",
        )
        .bind(rule_set)
        .bind(rule_set.map(|_| now.clone()))
        .bind(&vocabulary)
        .bind(&now)
        .bind(collection_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(total)
    }

    /// Rebuild the client / session / request graph of a collection
    pub async fn load_clients(&self, collection_id: &str) -> Result<Vec<Client>> {
        let client_rows = sqlx::query_as::<_, ClientRow>(
            "SELECT id, client_id, country, city, user_agent FROM clients WHERE collection_id = ? ORDER BY id",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        let session_rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT s.id, s.client_row_id, s.session_index FROM sessions s
            JOIN clients c ON s.client_row_id = c.id
            WHERE c.collection_id = ?
            ORDER BY s.client_row_id, s.session_index
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        let request_rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT r.session_id, r.timestamp, r.url, r.referer, r.response_code, r.action_tag
            FROM requests r
            JOIN sessions s ON r.session_id = s.id
            JOIN clients c ON s.client_row_id = c.id
            WHERE c.collection_id = ?
            ORDER BY r.session_id, r.position
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        let mut requests_by_session: HashMap<i64, Vec<Request>> = HashMap::new();
        for row in request_rows {
            let session_id = row.session_id;
            requests_by_session
                .entry(session_id)
                .or_default()
                .push(row.into_request()?);
        }

        let mut sessions_by_client: HashMap<i64, Vec<Session>> = HashMap::new();
        for row in session_rows {
            sessions_by_client
                .entry(row.client_row_id)
                .or_default()
                .push(Session {
                    session_index: row.session_index as usize,
                    requests: requests_by_session.remove(&row.id).unwrap_or_default(),
                });
        }

        Ok(client_rows
            .into_iter()
            .map(|row| Client {
                sessions: sessions_by_client.remove(&row.id).unwrap_or_default(),
                client_id: row.client_id,
                country: row.country,
                city: row.city,
                user_agent: row.user_agent,
            })
            .collect())
    }

    // ===== Rule Set Operations =====

    /// Insert or replace a rule set
    pub async fn save_rule_set(&self, name: &str, rules_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO rule_sets (name, rules_json, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                rules_json = excluded.rules_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(rules_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_rule_set(&self, name: &str) -> Result<Option<StoredRuleSet>> {
        let rules = sqlx::query_as::<_, StoredRuleSet>("SELECT * FROM rule_sets WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rules)
    }

    pub async fn list_rule_sets(&self) -> Result<Vec<StoredRuleSet>> {
        let rules = sqlx::query_as::<_, StoredRuleSet>("SELECT * FROM rule_sets ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rules)
    }

    // ===== Statistics =====

    /// Get statistics for a collection
    pub async fn get_collection_stats(&self, collection_id: &str) -> Result<CollectionStats> {
        let file_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ingested_files WHERE collection_id = ?")
                .bind(collection_id)
                .fetch_one(&self.pool)
                .await?;

        let client_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE collection_id = ?")
                .bind(collection_id)
                .fetch_one(&self.pool)
                .await?;

        let session_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sessions s
            JOIN clients c ON s.client_row_id = c.id
            WHERE c.collection_id = ?
            "#,
        )
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await?;

        let (request_count, tagged_request_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(r.action_tag) FROM requests r
            JOIN sessions s ON r.session_id = s.id
            JOIN clients c ON s.client_row_id = c.id
            WHERE c.collection_id = ?
            "#,
        )
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CollectionStats {
            file_count: file_count as usize,
            client_count: client_count as usize,
            session_count: session_count as usize,
            request_count: request_count as usize,
            tagged_request_count: tagged_request_count as usize,
        })
    }

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        Ok(GlobalStats {
            collection_count: self.count_rows("collections").await?,
            file_count: self.count_rows("ingested_files").await?,
            client_count: self.count_rows("clients").await?,
            session_count: self.count_rows("sessions").await?,
            request_count: self.count_rows("requests").await?,
            rule_set_count: self.count_rows("rule_sets").await?,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as usize)
    }
}
