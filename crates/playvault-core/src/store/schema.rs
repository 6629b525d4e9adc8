//! Store schema creation and additive migration.
//!
//! Structural changes are additive only: new optional columns are probed
//! against the live column catalog before any `ALTER TABLE` is issued,
//! and nothing ever drops or rewrites existing data.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

const BASE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS beatmaps (
    hash            TEXT PRIMARY KEY,
    title           TEXT NOT NULL DEFAULT '',
    artist          TEXT NOT NULL DEFAULT '',
    mapper          TEXT NOT NULL DEFAULT '',
    version         TEXT NOT NULL DEFAULT '',
    bpm             REAL NOT NULL DEFAULT 0,
    length_ms       INTEGER NOT NULL DEFAULT 0,
    circles         INTEGER NOT NULL DEFAULT 0,
    sliders         INTEGER NOT NULL DEFAULT 0,
    spinners        INTEGER NOT NULL DEFAULT 0,
    max_combo       INTEGER NOT NULL DEFAULT 0,
    approach_rate   REAL NOT NULL DEFAULT 0,
    circle_size     REAL NOT NULL DEFAULT 0,
    overall_difficulty REAL NOT NULL DEFAULT 0,
    drain_rate      REAL NOT NULL DEFAULT 0,
    background_hash TEXT,
    last_played     TEXT,
    file_path       TEXT
);

CREATE TABLE IF NOT EXISTS plays (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp       TEXT NOT NULL,
    beatmap_hash    TEXT NOT NULL,
    outcome         TEXT NOT NULL,
    mods            TEXT NOT NULL DEFAULT '[]',
    c300            INTEGER NOT NULL DEFAULT 0,
    c100            INTEGER NOT NULL DEFAULT 0,
    c50             INTEGER NOT NULL DEFAULT 0,
    geki            INTEGER NOT NULL DEFAULT 0,
    katu            INTEGER NOT NULL DEFAULT 0,
    miss            INTEGER NOT NULL DEFAULT 0,
    max_combo       INTEGER NOT NULL DEFAULT 0,
    score           INTEGER NOT NULL,
    pp              REAL NOT NULL DEFAULT 0,
    stars           REAL NOT NULL DEFAULT 0,
    unstable_rate   REAL NOT NULL DEFAULT 0,
    hit_offsets     TEXT NOT NULL DEFAULT '[]',
    replay_path     TEXT,
    note            TEXT NOT NULL DEFAULT '',
    provenance      TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_plays_identity
    ON plays (timestamp, beatmap_hash, score);
";

/// Optional columns added after the base layout shipped.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("plays", "key_balance", "REAL"),
    ("plays", "cursor_offsets", "TEXT"),
];

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(BASE_SCHEMA)?;
    apply_additive_migrations(conn)?;
    Ok(())
}

fn apply_additive_migrations(conn: &Connection) -> Result<()> {
    for (table, column, kind) in ADDITIVE_COLUMNS {
        if !column_exists(conn, table, column)? {
            info!(table, column, "adding column");
            conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {kind}"))?;
        }
    }
    Ok(())
}

/// Probes the live column catalog.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        assert!(column_exists(&conn, "plays", "score").unwrap());
    }

    #[test]
    fn test_additive_columns_created() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert!(column_exists(&conn, "plays", "key_balance").unwrap());
        assert!(column_exists(&conn, "plays", "cursor_offsets").unwrap());
    }

    #[test]
    fn test_migration_preserves_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO plays (timestamp, beatmap_hash, outcome, score, provenance)
             VALUES ('2023-04-01T12:00:00Z', 'abc', 'Pass', 100, 'stable-import')",
            [],
        )
        .unwrap();
        // Re-running the migration path must not touch the data.
        initialize(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM plays", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_column_probe_negative() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert!(!column_exists(&conn, "plays", "no_such_column").unwrap());
    }
}
