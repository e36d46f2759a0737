/// SQL DDL for the songjam database.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS empire_builders (
    id TEXT PRIMARY KEY,
    host_id TEXT NOT NULL UNIQUE,
    token_name TEXT NOT NULL,
    token_symbol TEXT NOT NULL,
    token_image TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    token_address TEXT,
    empire_address TEXT,
    tx_hash TEXT,
    last_error TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_empire_builders_status ON empire_builders(status);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
