//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per canonical URL ever enqueued
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY,
    url TEXT UNIQUE NOT NULL,
    first_seen TEXT,
    last_seen TEXT,
    last_status INTEGER,
    etag TEXT,
    last_modified TEXT,
    content_hash TEXT,
    depth INTEGER
);

-- Append-only record of every fetch attempt
CREATE TABLE IF NOT EXISTS fetch_log (
    id INTEGER PRIMARY KEY,
    page_id INTEGER,
    fetched_at TEXT,
    status INTEGER,
    bytes INTEGER,
    error TEXT,
    FOREIGN KEY(page_id) REFERENCES pages(id)
);

CREATE INDEX IF NOT EXISTS idx_fetch_log_page ON fetch_log(page_id);

-- Observed link graph, including targets that were never crawled
CREATE TABLE IF NOT EXISTS links (
    from_page INTEGER,
    to_url TEXT,
    anchor TEXT,
    PRIMARY KEY(from_page, to_url),
    FOREIGN KEY(from_page) REFERENCES pages(id)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
