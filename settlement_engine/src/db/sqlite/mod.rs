pub mod db;

pub mod listings;
pub mod orders;
pub mod reconciliation;
pub mod wallets;

use std::{str::FromStr, time::Duration};

pub use db::SqliteDatabase;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

/// Concurrent writers queue on the database lock for up to this long before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
