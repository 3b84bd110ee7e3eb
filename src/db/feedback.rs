use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, sqlite::SqliteRow, FromRow, Row, SqlitePool};

use crate::domain::FeedbackRecord;

/// Operator verdicts on previously scanned content. Rows are written by the
/// feedback collection flow and only read at retrain time.
#[derive(Clone)]
pub struct FeedbackRepository {
    pool: SqlitePool,
}

impl FeedbackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, url_or_text: &str, is_phishing: bool) -> Result<i64> {
        let id = query(
            r#"INSERT INTO feedback (text, is_phishing, submitted_at) VALUES (?1, ?2, ?3)"#,
        )
        .bind(url_or_text)
        .bind(is_phishing)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn list_all(&self) -> Result<Vec<FeedbackRecord>> {
        let rows = query_as::<_, FeedbackRow>(
            r#"SELECT text, is_phishing, submitted_at FROM feedback ORDER BY id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeedbackRow::into_record).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as(r#"SELECT COUNT(*) FROM feedback"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

struct FeedbackRow {
    text: String,
    is_phishing: bool,
    submitted_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for FeedbackRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            text: row.try_get("text")?,
            is_phishing: row.try_get("is_phishing")?,
            submitted_at: row.try_get("submitted_at")?,
        })
    }
}

impl FeedbackRow {
    fn into_record(self) -> FeedbackRecord {
        FeedbackRecord {
            url_or_text: self.text,
            is_phishing: self.is_phishing,
            submitted_at: self.submitted_at,
        }
    }
}
