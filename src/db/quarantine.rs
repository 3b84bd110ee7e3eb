use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{query, query_as, sqlite::SqliteRow, FromRow, Row, SqliteConnection, SqlitePool};

pub const PHISHING_REASON: &str = "phishing";

#[derive(Clone)]
pub struct QuarantineRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct NewQuarantine<'a> {
    pub subject: &'a str,
    pub sender: &'a str,
    pub content: &'a str,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuarantineRecord {
    pub id: i64,
    pub subject: String,
    pub sender: String,
    pub content: String,
    pub reason: String,
    pub confidence: f64,
    pub status: String,
    pub quarantined_at: DateTime<Utc>,
}

impl QuarantineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: NewQuarantine<'_>) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_with(&mut conn, record).await
    }

    /// Same as [`QuarantineRepository::insert`] on a caller-owned connection,
    /// typically an open transaction.
    pub async fn insert_with(conn: &mut SqliteConnection, record: NewQuarantine<'_>) -> Result<i64> {
        let id = query(
            r#"INSERT INTO quarantine (subject, sender, content, reason, confidence, quarantined_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(record.subject)
        .bind(record.sender)
        .bind(record.content)
        .bind(PHISHING_REASON)
        .bind(record.confidence)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<QuarantineRecord>> {
        let rows = query_as::<_, QuarantineRecord>(
            r#"SELECT id, subject, sender, content, reason, confidence, status, quarantined_at
                FROM quarantine ORDER BY id DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl<'r> FromRow<'r, SqliteRow> for QuarantineRecord {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            subject: row.try_get("subject")?,
            sender: row.try_get("sender")?,
            content: row.try_get("content")?,
            reason: row.try_get("reason")?,
            confidence: row.try_get("confidence")?,
            status: row.try_get("status")?,
            quarantined_at: row.try_get("quarantined_at")?,
        })
    }
}
