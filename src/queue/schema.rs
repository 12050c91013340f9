//! Database schema for the durable frontier queue

/// SQL schema for the queue database
pub const SCHEMA_SQL: &str = r#"
-- Declared queues
CREATE TABLE IF NOT EXISTS queues (
    name TEXT PRIMARY KEY,
    durable INTEGER NOT NULL,
    declared_at TEXT NOT NULL
);

-- Messages; consumer is NULL while the message is ready
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL REFERENCES queues(name),
    body BLOB NOT NULL,
    published_at TEXT NOT NULL,
    consumer TEXT,
    delivered_at TEXT,
    redelivered INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_queue_consumer ON messages(queue, consumer, id);
CREATE INDEX IF NOT EXISTS idx_messages_consumer ON messages(consumer);
"#;

/// Messages of non-durable queues, dropped when a crawl starts
pub const PURGE_TRANSIENT_MESSAGES_SQL: &str =
    "DELETE FROM messages WHERE queue IN (SELECT name FROM queues WHERE durable = 0)";

/// Non-durable queue declarations; run after the message purge
pub const PURGE_TRANSIENT_QUEUES_SQL: &str = "DELETE FROM queues WHERE durable = 0";

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
