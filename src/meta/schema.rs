//! SQLite schema definition

/// SQL schema for the clickpath database
pub const SCHEMA_SQL: &str = r#"
-- Collections: named groups of ingested logs
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    rule_set TEXT,
    tagged_at TEXT,
    tag_vocabulary TEXT
);

-- Ingested files: one row per content hash per collection
CREATE TABLE IF NOT EXISTS ingested_files (
    collection_id TEXT NOT NULL REFERENCES collections(id),
    content_hash TEXT NOT NULL,
    file_name TEXT NOT NULL,
    rows_ingested INTEGER NOT NULL DEFAULT 0,
    ingested_at TEXT NOT NULL,
    PRIMARY KEY (collection_id, content_hash)
);

-- Clients: visitors identified by an opaque id
CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id TEXT NOT NULL REFERENCES collections(id),
    client_id TEXT NOT NULL,
    country TEXT,
    city TEXT,
    user_agent TEXT,
    UNIQUE(collection_id, client_id)
);

-- Sessions: inactivity-delimited runs of requests
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_row_id INTEGER NOT NULL REFERENCES clients(id),
    session_index INTEGER NOT NULL,
    UNIQUE(client_row_id, session_index)
);

-- Requests: normalized hits, in session order
CREATE TABLE IF NOT EXISTS requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    position INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    url TEXT NOT NULL,
    referer TEXT,
    response_code INTEGER,
    action_tag TEXT
);

-- Rule sets: named tagging cascades as JSON
CREATE TABLE IF NOT EXISTS rule_sets (
    name TEXT PRIMARY KEY,
    rules_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_clients_collection ON clients(collection_id);
CREATE INDEX IF NOT EXISTS idx_sessions_client ON sessions(client_row_id);
CREATE INDEX IF NOT EXISTS idx_requests_session ON requests(session_id, position);
CREATE INDEX IF NOT EXISTS idx_requests_tag ON requests(action_tag);
"#;
