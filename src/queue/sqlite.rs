//! SQLite broker implementation
//!
//! Messages live in a WAL-mode SQLite database, so the frontier survives a
//! process restart and a separate seeding process can publish into the same
//! file while workers consume from it.

use crate::queue::schema::{
    initialize_schema, PURGE_TRANSIENT_MESSAGES_SQL, PURGE_TRANSIENT_QUEUES_SQL,
};
use crate::queue::traits::{Broker, Delivery, DeliveryTag, QueueError, QueueResult, QueueStats};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// SQLite-backed durable broker
pub struct SqliteBroker {
    conn: Mutex<Connection>,
    notify: Arc<Notify>,
}

impl SqliteBroker {
    /// Opens or creates a queue database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteBroker)` - Successfully opened/created database
    /// * `Err(QueueError)` - Failed to open database
    pub fn open(path: &Path) -> QueueResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        // Another process (the seeder) may hold the write lock briefly
        conn.busy_timeout(Duration::from_secs(5))?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates a private in-memory broker
    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            notify: Arc::new(Notify::new()),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_declared(conn: &Connection, queue: &str) -> QueueResult<()> {
        let exists = conn
            .query_row("SELECT 1 FROM queues WHERE name = ?1", params![queue], |_| {
                Ok(())
            })
            .optional()?;

        match exists {
            Some(()) => Ok(()),
            None => Err(QueueError::UnknownQueue(queue.to_string())),
        }
    }
}

impl Broker for SqliteBroker {
    fn declare(&self, queue: &str, durable: bool) -> QueueResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO queues (name, durable, declared_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO NOTHING",
            params![queue, durable, now],
        )?;
        Ok(())
    }

    fn publish(&self, queue: &str, body: &[u8]) -> QueueResult<()> {
        {
            let conn = self.conn();
            Self::ensure_declared(&conn, queue)?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO messages (queue, body, published_at) VALUES (?1, ?2, ?3)",
                params![queue, body, now],
            )?;
        }
        self.notify.notify_waiters();
        Ok(())
    }

    fn try_consume(
        &self,
        queue: &str,
        consumer: &str,
        prefetch: u32,
    ) -> QueueResult<Option<Delivery>> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let held: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE queue = ?1 AND consumer = ?2",
            params![queue, consumer],
            |row| row.get(0),
        )?;
        if held >= i64::from(prefetch) {
            return Ok(None);
        }

        let next = tx
            .query_row(
                "SELECT id, body, redelivered FROM messages
                 WHERE queue = ?1 AND consumer IS NULL
                 ORDER BY id ASC LIMIT 1",
                params![queue],
                |row| {
                    Ok(Delivery {
                        tag: DeliveryTag(row.get(0)?),
                        body: row.get(1)?,
                        redelivered: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(delivery) = &next {
            let now = Utc::now().to_rfc3339();
            tx.execute(
                "UPDATE messages SET consumer = ?1, delivered_at = ?2 WHERE id = ?3",
                params![consumer, now, delivery.tag.0],
            )?;
        }

        tx.commit()?;
        Ok(next)
    }

    fn ack(&self, consumer: &str, tag: DeliveryTag) -> QueueResult<()> {
        let removed = self.conn().execute(
            "DELETE FROM messages WHERE id = ?1 AND consumer = ?2",
            params![tag.0, consumer],
        )?;
        if removed == 0 {
            return Err(QueueError::UnknownDeliveryTag(tag));
        }
        self.notify.notify_waiters();
        Ok(())
    }

    fn recover(&self, consumer: &str) -> QueueResult<u64> {
        let recovered = self.conn().execute(
            "UPDATE messages SET consumer = NULL, delivered_at = NULL, redelivered = 1
             WHERE consumer = ?1",
            params![consumer],
        )?;
        if recovered > 0 {
            self.notify.notify_waiters();
        }
        Ok(recovered as u64)
    }

    fn recover_all(&self, queue: &str) -> QueueResult<u64> {
        let recovered = self.conn().execute(
            "UPDATE messages SET consumer = NULL, delivered_at = NULL, redelivered = 1
             WHERE queue = ?1 AND consumer IS NOT NULL",
            params![queue],
        )?;
        if recovered > 0 {
            self.notify.notify_waiters();
        }
        Ok(recovered as u64)
    }

    fn unacked_by(&self, consumer: &str) -> QueueResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE consumer = ?1",
            params![consumer],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn stats(&self, queue: &str) -> QueueResult<QueueStats> {
        let conn = self.conn();
        Self::ensure_declared(&conn, queue)?;

        let (ready, unacked): (i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN consumer IS NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN consumer IS NOT NULL THEN 1 ELSE 0 END), 0)
             FROM messages WHERE queue = ?1",
            params![queue],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(QueueStats {
            ready: ready as u64,
            unacked: unacked as u64,
        })
    }

    fn purge_transient(&self) -> QueueResult<u64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let purged = tx.execute(PURGE_TRANSIENT_MESSAGES_SQL, [])?;
        tx.execute(PURGE_TRANSIENT_QUEUES_SQL, [])?;
        tx.commit()?;
        Ok(purged as u64)
    }

    fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}
