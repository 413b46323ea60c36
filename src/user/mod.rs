mod repository;
mod service;

pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};

/// User as saved on database. Username, Realname and Password hold
/// hex-encoded ciphertext, never plaintext.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct User {
    #[sqlx(rename = "UserID")]
    pub user_id: i64,
    #[sqlx(rename = "Username")]
    pub username: String,
    #[sqlx(rename = "Realname")]
    pub realname: String,
    #[sqlx(rename = "Password")]
    pub password: String,
    /// Truthy sentinel: `1` means administrator.
    #[sqlx(rename = "Admin")]
    pub admin: i64,
    #[sqlx(rename = "Enabled")]
    pub enabled: i64,
    /// Set and cleared together with `token_expiration`.
    #[sqlx(rename = "Token")]
    pub token: Option<String>,
    #[sqlx(rename = "TokenExpiration")]
    pub token_expiration: Option<i64>,
}

/// Per-user display and filter preferences, created lazily on first
/// resolution.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct Options {
    #[sqlx(rename = "OptionID")]
    #[serde(rename = "OptionID")]
    pub option_id: i64,
    #[sqlx(rename = "UserID")]
    #[serde(rename = "UserID")]
    pub user_id: i64,
    #[sqlx(rename = "ArchivedVisible")]
    #[serde(rename = "ArchivedVisible")]
    pub archived_visible: i64,
    #[sqlx(rename = "AutoAdd")]
    #[serde(rename = "AutoAdd")]
    pub auto_add: i64,
    #[sqlx(rename = "DarkMode")]
    #[serde(rename = "DarkMode")]
    pub dark_mode: i64,
    #[sqlx(rename = "HideTabs")]
    #[serde(rename = "HideTabs")]
    pub hide_tabs: i64,
    #[sqlx(rename = "SearchCount")]
    #[serde(rename = "SearchCount")]
    pub search_count: i64,
    #[sqlx(rename = "StillWatching")]
    #[serde(rename = "StillWatching")]
    pub still_watching: i64,
    #[sqlx(rename = "ShowMissingArtwork")]
    #[serde(rename = "ShowMissingArtwork")]
    pub show_missing_artwork: i64,
    #[sqlx(rename = "SourceFilter")]
    #[serde(rename = "SourceFilter")]
    pub source_filter: i64,
    #[sqlx(rename = "TypeFilter")]
    #[serde(rename = "TypeFilter")]
    pub type_filter: i64,
    #[sqlx(rename = "WatchListSortColumn")]
    #[serde(rename = "WatchListSortColumn")]
    pub sort_column: String,
    #[sqlx(rename = "WatchListSortDirection")]
    #[serde(rename = "WatchListSortDirection")]
    pub sort_direction: String,
    /// Serialized [`VisibleSection`] list, admin-filtered at seed time.
    #[sqlx(rename = "VisibleSections")]
    #[serde(rename = "VisibleSections")]
    pub visible_sections: String,
}

/// One row of the system-wide VisibleSections template.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct VisibleSection {
    pub id: i64,
    pub name: String,
}
