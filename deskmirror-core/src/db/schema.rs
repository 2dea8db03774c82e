//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Tables holding mirrored helpdesk entities
pub const MIRROR_TABLES: &[&str] = &["accounts", "inboxes", "conversations", "messages"];

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Mirror tables
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id               INTEGER PRIMARY KEY,
        name             TEXT,
        locale           TEXT,
        status           TEXT,
        created_at       TEXT,

        -- Lossless capture
        raw_data         JSON NOT NULL,
        last_synced_at   DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS inboxes (
        id               INTEGER PRIMARY KEY,
        account_id       INTEGER,
        name             TEXT,
        channel_type     TEXT,
        address          TEXT,

        raw_data         JSON NOT NULL,
        last_synced_at   DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS conversations (
        id               INTEGER PRIMARY KEY,
        account_id       INTEGER,
        inbox_id         INTEGER,
        status           TEXT,
        created_at       INTEGER,
        last_activity_at INTEGER,

        raw_data         JSON NOT NULL,
        last_synced_at   DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id               INTEGER PRIMARY KEY,
        conversation_id  INTEGER,
        inbox_id         INTEGER,
        message_type     INTEGER,
        sender_type      TEXT,
        sender_id        INTEGER,
        sender_role      TEXT,
        content          TEXT,
        created_at       INTEGER,

        raw_data         JSON NOT NULL,
        last_synced_at   DATETIME NOT NULL
    );
    "#,
    // Version 2: Read-path indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_conversations_inbox ON conversations(inbox_id);
    CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON messages(conversation_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_messages_inbox ON messages(inbox_id, created_at);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert_eq!(MIGRATIONS.len() as i32, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in MIRROR_TABLES {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_every_table_keeps_raw_data() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in MIRROR_TABLES {
            let columns: Vec<String> = conn
                .prepare(&format!("PRAGMA table_info({})", table))
                .unwrap()
                .query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect();
            assert!(columns.iter().any(|c| c == "raw_data"), "{} raw_data", table);
            assert!(
                columns.iter().any(|c| c == "last_synced_at"),
                "{} last_synced_at",
                table
            );
        }
    }
}
