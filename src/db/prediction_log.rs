use anyhow::Result;
use chrono::Utc;
use sqlx::{query, query_as, SqliteConnection, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Url,
    Email,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Url => "url",
            ScanKind::Email => "email",
        }
    }
}

/// Audit trail of every verdict handed out, for reporting.
#[derive(Clone)]
pub struct PredictionLogRepository {
    pool: SqlitePool,
}

impl PredictionLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        kind: ScanKind,
        input: &str,
        prediction: bool,
        confidence: f64,
        findings: &[String],
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::append_with(&mut conn, kind, input, prediction, confidence, findings).await
    }

    pub async fn append_with(
        conn: &mut SqliteConnection,
        kind: ScanKind,
        input: &str,
        prediction: bool,
        confidence: f64,
        findings: &[String],
    ) -> Result<()> {
        query(
            r#"INSERT INTO prediction_log (input, kind, prediction, confidence, findings, logged_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(input)
        .bind(kind.as_str())
        .bind(prediction)
        .bind(confidence)
        .bind(serde_json::to_string(findings)?)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// `(total, flagged)` counts, optionally restricted to one scan kind.
    pub async fn summary(&self, kind: Option<ScanKind>) -> Result<(i64, i64)> {
        let row: (i64, Option<i64>) = match kind {
            Some(kind) => {
                query_as(
                    r#"SELECT COUNT(*), SUM(prediction) FROM prediction_log WHERE kind = ?1"#,
                )
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                query_as(r#"SELECT COUNT(*), SUM(prediction) FROM prediction_log"#)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok((row.0, row.1.unwrap_or(0)))
    }
}
