//! Database repository layer
//!
//! Upserts for mirrored helpdesk entities and the read paths used by the
//! intent coverage report and the health check.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Mutex;

use super::schema::MIRROR_TABLES;

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Upserts
    // ============================================

    /// Insert or update an account
    pub fn upsert_account(&self, account: &Account, raw: &Value) -> Result<()> {
        let id = require_id("account", account.id)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO accounts (id, name, locale, status, created_at, raw_data, last_synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                locale = excluded.locale,
                status = excluded.status,
                created_at = excluded.created_at,
                raw_data = excluded.raw_data,
                last_synced_at = excluded.last_synced_at
            "#,
            params![
                id,
                account.name,
                account.locale,
                account.status,
                account.created_at,
                raw.to_string(),
                synced_now(),
            ],
        )?;
        Ok(())
    }

    /// Insert or update an inbox
    pub fn upsert_inbox(&self, inbox: &Inbox, raw: &Value) -> Result<()> {
        let id = require_id("inbox", inbox.id)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO inboxes (id, account_id, name, channel_type, address, raw_data, last_synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                name = excluded.name,
                channel_type = excluded.channel_type,
                address = excluded.address,
                raw_data = excluded.raw_data,
                last_synced_at = excluded.last_synced_at
            "#,
            params![
                id,
                inbox.account_id,
                inbox.name,
                inbox.channel_type,
                inbox.address,
                raw.to_string(),
                synced_now(),
            ],
        )?;
        Ok(())
    }

    /// Insert or update a conversation
    pub fn upsert_conversation(&self, conversation: &Conversation, raw: &Value) -> Result<()> {
        let id = require_id("conversation", conversation.id)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO conversations (
                id, account_id, inbox_id, status, created_at, last_activity_at,
                raw_data, last_synced_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                inbox_id = excluded.inbox_id,
                status = excluded.status,
                created_at = excluded.created_at,
                last_activity_at = excluded.last_activity_at,
                raw_data = excluded.raw_data,
                last_synced_at = excluded.last_synced_at
            "#,
            params![
                id,
                conversation.account_id,
                conversation.inbox_id,
                conversation.status,
                conversation.created_at,
                conversation.last_activity_at,
                raw.to_string(),
                synced_now(),
            ],
        )?;
        Ok(())
    }

    /// Insert or update a message
    pub fn upsert_message(&self, message: &Message, raw: &Value) -> Result<()> {
        let id = require_id("message", message.id)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO messages (
                id, conversation_id, inbox_id, message_type, sender_type, sender_id,
                sender_role, content, created_at, raw_data, last_synced_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                conversation_id = excluded.conversation_id,
                inbox_id = excluded.inbox_id,
                message_type = excluded.message_type,
                sender_type = excluded.sender_type,
                sender_id = excluded.sender_id,
                sender_role = excluded.sender_role,
                content = excluded.content,
                created_at = excluded.created_at,
                raw_data = excluded.raw_data,
                last_synced_at = excluded.last_synced_at
            "#,
            params![
                id,
                message.conversation_id,
                message.inbox_id,
                message.message_type,
                message.sender_type,
                message.sender_id,
                message.sender_role.map(|r| r.as_str()),
                message.content,
                message.created_at,
                raw.to_string(),
                synced_now(),
            ],
        )?;
        Ok(())
    }

    // ============================================
    // Reads
    // ============================================

    /// Message records for intent coverage, in inbox/conversation/time order.
    ///
    /// `limit` caps how many rows are read.
    pub fn list_message_records(&self, limit: Option<usize>) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            r#"
            SELECT content, conversation_id, created_at
            FROM messages
            ORDER BY inbox_id, conversation_id, created_at, id
            "#,
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], |row| {
                Ok(MessageRecord {
                    text: row.get(0)?,
                    conversation_id: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        tracing::debug!(count = records.len(), ?limit, "Loaded message records");
        Ok(records)
    }

    /// Ids of all mirrored conversations, ascending
    pub fn list_conversation_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM conversations ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Row count of one mirror table
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        if !MIRROR_TABLES.contains(&table) {
            return Err(Error::Config(format!("unknown table: {}", table)));
        }
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Row counts for every mirror table, in schema order
    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        MIRROR_TABLES
            .iter()
            .map(|table| Ok((*table, self.count_rows(table)?)))
            .collect()
    }

    /// Trivial query proving the connection works
    pub fn check(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn require_id(entity: &str, id: Option<i64>) -> Result<i64> {
    id.ok_or_else(|| Error::InvalidRecord {
        entity: entity.to_string(),
        message: "payload has no id".to_string(),
    })
}

fn synced_now() -> String {
    Utc::now().to_rfc3339()
}
