use std::sync::Arc;

use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    db::{NewQuarantine, PredictionLogRepository, QuarantineRepository, ScanKind},
    domain::{EmailScan, ScanReport},
    model::{ModelError, ModelStore},
    policy::ScanState,
    rules::{evaluate, extract_urls},
};

const LOG_SNIPPET_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("email body is not valid UTF-8: {0}")]
    MalformedInput(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("failed to record scan result: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Entry point for prediction calls. Scores with the active model, applies
/// the heuristics and records quarantine and audit rows.
#[derive(Clone)]
pub struct ScanService {
    store: Arc<ModelStore>,
    pool: SqlitePool,
    log: PredictionLogRepository,
}

impl ScanService {
    pub fn new(store: Arc<ModelStore>, pool: SqlitePool) -> Self {
        Self {
            store,
            log: PredictionLogRepository::new(pool.clone()),
            pool,
        }
    }

    /// Classifier-only verdict for a bare URL or text. Never quarantines.
    pub async fn predict_url(&self, text: &str) -> Result<ScanReport, ScanError> {
        let artifact = self.store.load_or_train().await?;
        let probability = artifact.score(text);
        let (_, verdict) = ScanState::default().resolve(probability, None);

        self.log
            .append(
                ScanKind::Url,
                text,
                verdict.prediction.label,
                verdict.prediction.confidence,
                &[],
            )
            .await?;

        tracing::debug!(
            target: "scan",
            label = verdict.prediction.label,
            confidence = verdict.prediction.confidence,
            "url scanned"
        );
        Ok(ScanReport {
            label: verdict.prediction.label,
            confidence: verdict.prediction.confidence,
            findings: Vec::new(),
            quarantined: false,
        })
    }

    /// Full verdict for one email. A flagged email gets exactly one
    /// quarantine record, committed together with its audit row.
    pub async fn scan_email(&self, email: EmailScan) -> Result<ScanReport, ScanError> {
        let artifact = self.store.load_or_train().await?;
        let body = decode_body(&email.body);

        let links = match email.links {
            Some(links) => links,
            None => extract_urls(body),
        };
        let findings = evaluate(&email.subject, &email.sender, body, &links);
        let probability = artifact.score(body);
        let (_, verdict) = ScanState::default().resolve(probability, Some(&findings));
        let findings: Vec<String> = findings.iter().map(ToString::to_string).collect();

        let mut tx = self.pool.begin().await.map_err(anyhow::Error::from)?;
        let quarantine_id = if verdict.quarantine {
            let id = QuarantineRepository::insert_with(
                &mut tx,
                NewQuarantine {
                    subject: &email.subject,
                    sender: &email.sender,
                    content: body,
                    confidence: verdict.prediction.confidence,
                },
            )
            .await?;
            Some(id)
        } else {
            None
        };
        PredictionLogRepository::append_with(
            &mut tx,
            ScanKind::Email,
            snippet(body),
            verdict.prediction.label,
            verdict.prediction.confidence,
            &findings,
        )
        .await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        if let Some(id) = quarantine_id {
            tracing::info!(
                target: "scan",
                quarantine_id = id,
                confidence = verdict.prediction.confidence,
                findings = findings.len(),
                "email quarantined"
            );
        }

        Ok(ScanReport {
            label: verdict.prediction.label,
            confidence: verdict.prediction.confidence,
            findings,
            quarantined: verdict.quarantine,
        })
    }

    /// Scans each email independently; one failure does not stop the rest.
    pub async fn scan_batch(&self, emails: Vec<EmailScan>) -> Vec<Result<ScanReport, ScanError>> {
        let total = emails.len();
        let mut results = Vec::with_capacity(total);
        for email in emails {
            let result = self.scan_email(email).await;
            if let Err(err) = &result {
                tracing::error!(target: "scan", error = %err, "email scan failed");
            }
            results.push(result);
        }

        let quarantined = results
            .iter()
            .filter(|r| matches!(r, Ok(report) if report.quarantined))
            .count();
        tracing::info!(target: "scan", total, quarantined, "batch scan finished");
        results
    }
}

/// Undecodable bodies are scanned as empty text.
fn decode_body(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let err = ScanError::MalformedInput(err);
            tracing::warn!(target: "scan", error = %err, len = bytes.len(), "scanning email with empty body");
            ""
        }
    }
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(LOG_SNIPPET_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
