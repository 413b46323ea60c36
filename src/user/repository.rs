//! Handle database requests.
//!
//! Every method opens its own connection via [`Database::connection`] and
//! closes it on drop, so an absent store file surfaces as a store error on
//! the call itself and concurrent requests never contend on one handle.
//! Multi-step flows are not wrapped in a transaction.

use sqlx::sqlite::SqliteConnection;

use crate::database::Database;
use crate::error::Result;
use crate::user::{Options, User, VisibleSection};

#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn conn(&self) -> Result<SqliteConnection> {
        Ok(self.db.connection().await?)
    }

    /// All rows eligible for login.
    pub async fn enabled_users(&self) -> Result<Vec<User>> {
        let mut conn = self.conn().await?;

        let users =
            sqlx::query_as::<_, User>("SELECT * FROM Users WHERE Enabled = 1")
                .fetch_all(&mut conn)
                .await?;

        Ok(users)
    }

    /// Rows holding the given session token.
    ///
    /// Usernames are ciphered with a random nonce, so the username half of a
    /// composite token cannot be matched in SQL. The caller compares it
    /// against the decrypted column instead.
    pub async fn find_by_token(&self, token: &str) -> Result<Vec<User>> {
        let mut conn = self.conn().await?;

        let users =
            sqlx::query_as::<_, User>("SELECT * FROM Users WHERE Token = ?")
                .bind(token)
                .fetch_all(&mut conn)
                .await?;

        Ok(users)
    }

    /// Persist a freshly minted token and its expiration.
    pub async fn set_token(
        &self,
        user_id: i64,
        token: &str,
        expiration: i64,
    ) -> Result<()> {
        let mut conn = self.conn().await?;

        sqlx::query(
            "UPDATE Users SET Token = ?, TokenExpiration = ? WHERE UserID = ?",
        )
        .bind(token)
        .bind(expiration)
        .bind(user_id)
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    /// Revoke a token. Token and TokenExpiration are cleared together.
    pub async fn clear_token(&self, user_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;

        sqlx::query(
            "UPDATE Users SET Token = NULL, TokenExpiration = NULL \
             WHERE UserID = ?",
        )
        .bind(user_id)
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    /// Insert a provisioned user. Field values must already be ciphered.
    pub async fn insert(
        &self,
        username_cipher: &str,
        realname_cipher: &str,
        password_cipher: &str,
        admin: i64,
        enabled: i64,
    ) -> Result<i64> {
        let mut conn = self.conn().await?;

        let result = sqlx::query(
            "INSERT INTO Users (Username, Realname, Password, Admin, Enabled) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username_cipher)
        .bind(realname_cipher)
        .bind(password_cipher)
        .bind(admin)
        .bind(enabled)
        .execute(&mut conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Options record of a user, when one exists.
    pub async fn options_by_user(&self, user_id: i64) -> Result<Option<Options>> {
        let mut conn = self.conn().await?;

        let options = sqlx::query_as::<_, Options>(
            "SELECT * FROM Options WHERE UserID = ?",
        )
        .bind(user_id)
        .fetch_optional(&mut conn)
        .await?;

        Ok(options)
    }

    /// The VisibleSections template, without the `Admin` entry for
    /// non-admin users.
    pub async fn visible_sections(
        &self,
        include_admin: bool,
    ) -> Result<Vec<VisibleSection>> {
        let mut conn = self.conn().await?;

        let sql = if include_admin {
            "SELECT * FROM VisibleSections"
        } else {
            "SELECT * FROM VisibleSections WHERE name != 'Admin'"
        };

        let sections = sqlx::query_as::<_, VisibleSection>(sql)
            .fetch_all(&mut conn)
            .await?;

        Ok(sections)
    }

    /// Seed the default Options row for a user.
    ///
    /// `sections_json` is marshalled into the statement as a literal: it is
    /// serialized server-side from the VisibleSections template and never
    /// contains user input.
    pub async fn seed_default_options(
        &self,
        user_id: i64,
        sections_json: &str,
    ) -> Result<()> {
        let mut conn = self.conn().await?;

        let sql = format!(
            "INSERT INTO Options (UserID, ArchivedVisible, AutoAdd, DarkMode, \
             HideTabs, SearchCount, StillWatching, ShowMissingArtwork, \
             SourceFilter, TypeFilter, WatchListSortColumn, \
             WatchListSortDirection, VisibleSections) \
             VALUES ({user_id}, 0, 1, 1, 0, 5, 1, 0, -1, -1, 'Name', 'ASC', \
             '{sections_json}')",
        );
        sqlx::query(&sql).execute(&mut conn).await?;

        Ok(())
    }

    /// Number of Options rows held by a user. Test support for the
    /// seed-exactly-once property.
    #[cfg(test)]
    pub async fn options_count(&self, user_id: i64) -> Result<i64> {
        let mut conn = self.conn().await?;

        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM Options WHERE UserID = ?",
        )
        .bind(user_id)
        .fetch_one(&mut conn)
        .await?;

        Ok(count.0)
    }

    /// Raw connection for test fixtures.
    #[cfg(test)]
    pub async fn raw_conn(&self) -> SqliteConnection {
        self.db.connection().await.unwrap()
    }

    /// Token columns of a user. Test support for revocation checks.
    #[cfg(test)]
    pub async fn token_state(
        &self,
        user_id: i64,
    ) -> Result<(Option<String>, Option<i64>)> {
        let mut conn = self.conn().await?;

        let row: (Option<String>, Option<i64>) = sqlx::query_as(
            "SELECT Token, TokenExpiration FROM Users WHERE UserID = ?",
        )
        .bind(user_id)
        .fetch_one(&mut conn)
        .await?;

        Ok(row)
    }
}
