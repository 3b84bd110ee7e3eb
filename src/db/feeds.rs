use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, sqlite::SqliteRow, FromRow, Row, SqliteConnection, SqlitePool};

use crate::domain::{FeedEntry, FeedSource};

/// Phishing URLs collected from the upstream feeds. `url` is the primary key,
/// so a URL is stored once no matter how often or from where it is seen.
#[derive(Clone)]
pub struct FeedRepository {
    pool: SqlitePool,
}

impl FeedRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores the entry unless the URL is already known. Returns whether a row
    /// was written; an existing row is never overwritten.
    pub async fn insert_if_absent(&self, entry: &FeedEntry) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        insert_with(&mut conn, entry).await
    }

    /// Stores a whole refresh in one transaction and returns the entries that
    /// were new. On error nothing from the batch is kept.
    pub async fn insert_all(&self, entries: Vec<FeedEntry>) -> Result<Vec<FeedEntry>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::new();
        for entry in entries {
            if insert_with(&mut tx, &entry).await? {
                inserted.push(entry);
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn list_all(&self) -> Result<Vec<FeedEntry>> {
        let rows = query_as::<_, FeedEntryRow>(
            r#"SELECT url, source, observed_at FROM feed_entries ORDER BY observed_at ASC, url ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as(r#"SELECT COUNT(*) FROM feed_entries"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn insert_with(conn: &mut SqliteConnection, entry: &FeedEntry) -> Result<bool> {
    let affected = query(
        r#"INSERT OR IGNORE INTO feed_entries (url, source, observed_at) VALUES (?1, ?2, ?3)"#,
    )
    .bind(&entry.url)
    .bind(entry.source.as_str())
    .bind(entry.observed_at)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

struct FeedEntryRow(FeedEntry);

impl<'r> FromRow<'r, SqliteRow> for FeedEntryRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let source: String = row.try_get("source")?;
        let source = FeedSource::parse(&source).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "source".into(),
            source: format!("unknown feed source {source:?}").into(),
        })?;
        let observed_at: DateTime<Utc> = row.try_get("observed_at")?;
        Ok(Self(FeedEntry {
            url: row.try_get("url")?,
            source,
            observed_at,
        }))
    }
}
