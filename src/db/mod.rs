use std::{path::Path, str::FromStr, time::Duration};

use anyhow::Result;
use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};

pub mod feedback;
pub mod feeds;
pub mod prediction_log;
pub mod quarantine;

pub use feedback::FeedbackRepository;
pub use feeds::FeedRepository;
pub use prediction_log::{PredictionLogRepository, ScanKind};
pub use quarantine::{NewQuarantine, QuarantineRecord, QuarantineRepository};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        is_phishing BOOLEAN NOT NULL,
        submitted_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feed_entries (
        url TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        observed_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quarantine (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject TEXT NOT NULL,
        sender TEXT NOT NULL,
        content TEXT NOT NULL,
        reason TEXT NOT NULL,
        confidence REAL NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        quarantined_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS prediction_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        input TEXT NOT NULL,
        kind TEXT NOT NULL,
        prediction BOOLEAN NOT NULL,
        confidence REAL NOT NULL,
        findings TEXT NOT NULL,
        logged_at DATETIME NOT NULL
    )
    "#,
];

pub async fn init_pool(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    tracing::info!(target: "db", path = %db_path.display(), "database ready");
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        query(*statement).execute(pool).await?;
    }
    Ok(())
}

/// Single-connection in-memory database; every connection to `:memory:` would
/// otherwise see its own empty schema.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").expect("valid memory url");
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("in-memory sqlite");
    migrate(&pool).await.expect("schema");
    pool
}
