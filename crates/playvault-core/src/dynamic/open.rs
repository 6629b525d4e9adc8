//! Dynamic store opening and schema-version bootstrap.
//!
//! The companion client's store declares its schema version only in the
//! on-disk file, and the client may hold the file under an active write
//! lock. Opening therefore goes through two quirks that are replicated
//! here deliberately:
//!
//! 1. Copy-then-read: the source file is copied under a shared read lock
//!    to a private scratch file, which is removed unconditionally once the
//!    store handle drops, including on failure.
//! 2. Version bootstrap: opening with a wrong assumed version fails with a
//!    diagnostic that embeds the true on-disk version; [`DynamicStore::open`]
//!    parses the version back out of that message text and reopens. Fragile,
//!    but the store exposes no other read-only version channel.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Schema version this reader was written against.
pub const SUPPORTED_SCHEMA_VERSION: i64 = 14;

/// Marker text inside the version-mismatch diagnostic. The bootstrap
/// parses the integer that follows it.
const VERSION_MARKER: &str = "last set version";

/// Scratch copy of the source file, removed on drop.
#[derive(Debug)]
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn create(source: &Path) -> Result<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let name = format!("playvault-scratch-{}-{stamp}.db", process::id());
        let path = std::env::temp_dir().join(name);

        // fs::copy opens the source with shared read access, so the
        // companion client's write lock is never contended.
        fs::copy(source, &path)?;
        debug!(?path, "copied dynamic store to scratch");
        Ok(Self { path })
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove scratch file {:?}: {e}", self.path);
        }
    }
}

/// An opened dynamic store: a read-only connection to a scratch copy.
#[derive(Debug)]
pub struct DynamicStore {
    conn: Connection,
    schema_version: i64,
    _scratch: ScratchFile,
}

impl DynamicStore {
    /// Opens the store, discovering the schema version via the mismatch
    /// diagnostic when the assumed version is wrong.
    pub fn open(path: &Path) -> Result<Self> {
        match Self::open_at(path, SUPPORTED_SCHEMA_VERSION) {
            Ok(store) => Ok(store),
            Err(Error::StoreVersionMismatch(message)) => {
                let actual = parse_version_from_message(&message).ok_or_else(|| {
                    Error::StoreVersionMismatch(format!(
                        "unparseable version diagnostic: {message}"
                    ))
                })?;
                info!(
                    assumed = SUPPORTED_SCHEMA_VERSION,
                    actual, "reopening dynamic store at discovered schema version"
                );
                Self::open_at(path, actual)
            }
            Err(e) => Err(e),
        }
    }

    /// Opens the store asserting a specific schema version.
    pub fn open_at(path: &Path, assumed_version: i64) -> Result<Self> {
        if !path.exists() {
            return Err(Error::SourceNotFound(path.display().to_string()));
        }

        let scratch = ScratchFile::create(path)?;
        let conn = Connection::open_with_flags(
            &scratch.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let schema_version: i64 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if schema_version != assumed_version {
            // Scratch is dropped (and removed) on this return path.
            return Err(Error::StoreVersionMismatch(format!(
                "provided schema version {assumed_version} does not match the file on disk: \
                 last set version {schema_version}"
            )));
        }

        Ok(Self {
            conn,
            schema_version,
            _scratch: scratch,
        })
    }

    pub fn schema_version(&self) -> i64 {
        self.schema_version
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// True if the store contains a table with the given name.
    pub fn has_table(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Extracts the on-disk version from a mismatch diagnostic.
pub fn parse_version_from_message(message: &str) -> Option<i64> {
    let idx = message.find(VERSION_MARKER)?;
    let rest = message[idx + VERSION_MARKER.len()..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_file(dir: &TempDir, version: i64) -> PathBuf {
        let path = dir.path().join("client.db");
        let conn = Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", version).unwrap();
        conn.execute_batch("CREATE TABLE scores (id INTEGER PRIMARY KEY)")
            .unwrap();
        path
    }

    #[test]
    fn test_parse_version_from_message() {
        assert_eq!(
            parse_version_from_message("open failed: last set version 7"),
            Some(7)
        );
        assert_eq!(
            parse_version_from_message("last set version 14, cannot downgrade"),
            Some(14)
        );
        assert_eq!(parse_version_from_message("no marker here"), None);
    }

    #[test]
    fn test_wrong_version_embeds_actual_in_message() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir, 7);
        let err = DynamicStore::open_at(&path, 99).unwrap_err();
        match err {
            Error::StoreVersionMismatch(message) => {
                assert!(message.contains("last set version 7"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bootstrap_recovers_discovered_version() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir, 7);
        // 7 != SUPPORTED_SCHEMA_VERSION, so this exercises the reopen.
        let store = DynamicStore::open(&path).unwrap();
        assert_eq!(store.schema_version(), 7);
    }

    #[test]
    fn test_second_open_at_discovered_version_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir, 7);
        let err = DynamicStore::open_at(&path, SUPPORTED_SCHEMA_VERSION).unwrap_err();
        let Error::StoreVersionMismatch(message) = err else {
            panic!("expected version mismatch");
        };
        let version = parse_version_from_message(&message).unwrap();
        assert_eq!(version, 7);
        let store = DynamicStore::open_at(&path, version).unwrap();
        assert_eq!(store.schema_version(), 7);
    }

    #[test]
    fn test_missing_store_is_source_not_found() {
        let err = DynamicStore::open(Path::new("/nonexistent/client.db")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[test]
    fn test_scratch_removed_after_drop() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir, SUPPORTED_SCHEMA_VERSION);
        let before: Vec<_> = scratch_files();
        {
            let _store = DynamicStore::open(&path).unwrap();
        }
        let after: Vec<_> = scratch_files();
        assert_eq!(before.len(), after.len());
    }

    fn scratch_files() -> Vec<PathBuf> {
        std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("playvault-scratch-"))
            })
            .collect()
    }
}
