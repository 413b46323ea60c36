//! SQLite store adapter.
//!
//! The whole instance lives in one SQLite file. Absence of that file is the
//! signal for an uninitialized instance, so no connection is opened at
//! startup: each store call opens its own connection and closes it after
//! use, and the file is only ever created by [`Database::provision`].

use std::path::{Path, PathBuf};

use axum::extract::FromRef;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Executor};

use crate::AppState;

const USERS_SQL: &str = "CREATE TABLE Users (UserID INTEGER PRIMARY KEY, \
     Username TEXT NOT NULL, Realname TEXT NOT NULL, Password TEXT NOT NULL, \
     Admin TINYINT(1) NULL DEFAULT 0, Enabled TINYINT(1) NULL DEFAULT 0, \
     Token TEXT NULL, TokenExpiration INTEGER NULL);";
const OPTIONS_SQL: &str = "CREATE TABLE Options (OptionID INTEGER PRIMARY KEY, \
     UserID INT, ArchivedVisible TINYINT(1), AutoAdd TINYINT(1), \
     DarkMode TINYINT(1), HideTabs TINYINT(1), SearchCount INT, \
     StillWatching TINYINT(1), ShowMissingArtwork TINYINT(1), SourceFilter INT, \
     TypeFilter INT, WatchListSortColumn VARCHAR(100), \
     WatchListSortDirection VARCHAR(100), VisibleSections VARCHAR(1000));";
const VISIBLE_SECTIONS_SQL: &str = "CREATE TABLE VisibleSections \
     (id INTEGER PRIMARY KEY, name VARCHAR(100));";

/// UI sections seeded into the VisibleSections template on first run.
/// `Admin` is filtered out of non-admin Options records.
pub const DEFAULT_SECTIONS: [&str; 5] =
    ["Home", "WatchList", "Items", "Stats", "Admin"];

/// Handle on the store file.
#[derive(Clone, Debug)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Create a new [`Database`] pointing at a store file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store file has been provisioned.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Open a connection for a single call.
    ///
    /// Never creates the file: an absent store must keep signalling an
    /// uninitialized instance.
    pub async fn connection(&self) -> Result<SqliteConnection, sqlx::Error> {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(false)
            .connect()
            .await
    }

    /// First-run setup: create the store file, its tables and the
    /// VisibleSections template.
    pub async fn provision(&self) -> Result<(), sqlx::Error> {
        let mut conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .connect()
            .await?;

        conn.execute(USERS_SQL).await?;
        conn.execute(OPTIONS_SQL).await?;
        conn.execute(VISIBLE_SECTIONS_SQL).await?;

        for name in DEFAULT_SECTIONS {
            sqlx::query("INSERT INTO VisibleSections (name) VALUES (?)")
                .bind(name)
                .execute(&mut conn)
                .await?;
        }

        tracing::info!(path = %self.path.display(), "store provisioned");

        Ok(())
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(app_state: &AppState) -> Database {
        app_state.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provision_creates_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("watchlistdb.sqlite"));

        assert!(!db.exists());
        assert!(db.connection().await.is_err());

        db.provision().await.unwrap();
        assert!(db.exists());

        let mut conn = db.connection().await.unwrap();
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM VisibleSections")
                .fetch_one(&mut conn)
                .await
                .unwrap();
        assert_eq!(count.0, DEFAULT_SECTIONS.len() as i64);
    }
}
