// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Database connection management.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::error::{Error, Result};

/// Location string that selects an ephemeral in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Where the metadata database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// Single database file on disk
    File(PathBuf),
    /// Ephemeral database, destroyed when the connection closes
    Memory,
}

impl DbLocation {
    pub fn is_memory(&self) -> bool {
        matches!(self, DbLocation::Memory)
    }
}

impl From<&str> for DbLocation {
    fn from(value: &str) -> Self {
        if value == IN_MEMORY {
            DbLocation::Memory
        } else {
            DbLocation::File(PathBuf::from(value))
        }
    }
}

impl From<PathBuf> for DbLocation {
    fn from(value: PathBuf) -> Self {
        if value.as_os_str() == IN_MEMORY {
            DbLocation::Memory
        } else {
            DbLocation::File(value)
        }
    }
}

impl From<&Path> for DbLocation {
    fn from(value: &Path) -> Self {
        DbLocation::from(value.to_path_buf())
    }
}

/// Store behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Create unknown columns (as TEXT) on insert instead of failing.
    pub implicit_columns: bool,
    /// Close file-backed connections after every mutating operation.
    ///
    /// Never applies to in-memory stores.
    pub close_after_write: bool,
}

/// Handle to one metadata database.
///
/// The connection is opened lazily by the first operation and owned
/// exclusively by this handle until [`MetadataDb::close`].
pub struct MetadataDb {
    location: DbLocation,
    options: StoreOptions,
    pub(crate) conn: Option<Connection>,
}

impl MetadataDb {
    /// Create a handle for `location` with default options. Does not connect.
    pub fn new(location: impl Into<DbLocation>) -> Self {
        Self::with_options(location, StoreOptions::default())
    }

    pub fn with_options(location: impl Into<DbLocation>, options: StoreOptions) -> Self {
        Self {
            location: location.into(),
            options,
            conn: None,
        }
    }

    /// Create a handle for a fresh in-memory database (for testing).
    pub fn memory() -> Self {
        Self::new(DbLocation::Memory)
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Open the connection if it is not open yet.
    pub fn connect(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => open_connection(&self.location)?,
        };
        Ok(self.conn.insert(conn))
    }

    /// Get raw connection (for advanced usage), connecting if needed.
    pub fn connection(&mut self) -> Result<&Connection> {
        let conn: &Connection = self.connect()?;
        Ok(conn)
    }

    /// Commit any transaction left open on the connection.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(conn) = &self.conn {
            if !conn.is_autocommit() {
                conn.execute_batch("COMMIT")?;
                debug!("Committed pending transaction");
            }
        }
        Ok(())
    }

    /// Commit and close the connection.
    ///
    /// For an in-memory database this destroys its contents; the next
    /// operation connects to a new, empty instance.
    pub fn close(&mut self) -> Result<()> {
        self.commit()?;
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                self.conn = Some(conn);
                return Err(e.into());
            }
            debug!("Closed database connection ({:?})", self.location);
        }
        Ok(())
    }

    /// Called at the end of every mutating operation.
    pub(crate) fn finish_write(&mut self) -> Result<()> {
        if self.options.close_after_write && !self.location.is_memory() {
            self.close()?;
        }
        Ok(())
    }
}

fn open_connection(location: &DbLocation) -> Result<Connection> {
    let conn = match location {
        DbLocation::Memory => {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
            debug!("Created in-memory database");
            conn
        }
        DbLocation::File(path) => {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
            )
            .map_err(|e| Error::DatabaseOpen {
                path: path.to_owned(),
                source: e,
            })?;
            configure_pragmas(&conn)?;
            debug!("Opened database at {}", path.display());
            conn
        }
    };
    Ok(conn)
}

/// Configure SQLite pragmas for file-backed stores.
///
/// `synchronous = FULL` so a returned write is on disk.
fn configure_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = FULL;
        PRAGMA temp_store = MEMORY;
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parsing() {
        assert_eq!(DbLocation::from(IN_MEMORY), DbLocation::Memory);
        assert_eq!(DbLocation::from(PathBuf::from(IN_MEMORY)), DbLocation::Memory);
        assert_eq!(
            DbLocation::from("database.db"),
            DbLocation::File(PathBuf::from("database.db"))
        );
    }

    #[test]
    fn test_lazy_connect() {
        let mut db = MetadataDb::memory();
        assert!(!db.is_connected());
        db.connect().unwrap();
        assert!(db.is_connected());
        db.close().unwrap();
        assert!(!db.is_connected());
    }

    #[test]
    fn test_open_error_has_path() {
        let mut db = MetadataDb::new(PathBuf::from("/nonexistent-dir/sub/database.db"));
        match db.connect() {
            Err(Error::DatabaseOpen { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent-dir/sub/database.db"))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected open failure"),
        }
        assert!(!db.is_connected());
    }

    #[test]
    fn test_commit_closes_open_transaction() {
        let mut db = MetadataDb::memory();
        let conn = db.connect().unwrap();
        conn.execute_batch("BEGIN; CREATE TABLE t (x TEXT);").unwrap();
        assert!(!conn.is_autocommit());
        db.commit().unwrap();
        assert!(db.connection().unwrap().is_autocommit());
    }
}
