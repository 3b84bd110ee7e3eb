use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    db::{FeedRepository, FeedbackRepository},
    domain::{FeedEntry, FeedbackRecord, TrainingExample},
    model::{fit, ModelArtifact, ModelError, ModelStore},
};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("a retrain is already in progress")]
    InProgress,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("failed to read training data: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetrainOutcome {
    /// No feedback and no feed entries; the active artifact was kept.
    Skipped,
    Promoted { artifact_id: String, examples: usize },
    /// The promotion gate turned the candidate down; the active artifact was kept.
    Rejected { artifact_id: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct RetrainSummary {
    pub finished_at: DateTime<Utc>,
    pub result: Result<RetrainOutcome, String>,
}

/// Optional check run on a freshly fitted artifact before it replaces the
/// active one. Without a gate every successful fit is promoted.
pub trait PromotionGate: Send + Sync {
    fn review(&self, candidate: &ModelArtifact, active: Option<&ModelArtifact>) -> Result<(), String>;
}

/// Feedback rows keep the operator's label; feed URLs are always positive.
/// Blank texts are dropped.
pub fn assemble_dataset(feedback: &[FeedbackRecord], feeds: &[FeedEntry]) -> Vec<TrainingExample> {
    feedback
        .iter()
        .map(|row| TrainingExample::new(row.url_or_text.trim(), row.is_phishing))
        .chain(feeds.iter().map(|entry| TrainingExample::new(entry.url.trim(), true)))
        .filter(|example| !example.text.is_empty())
        .collect()
}

pub struct TrainingPipeline {
    store: Arc<ModelStore>,
    feedback: FeedbackRepository,
    feeds: FeedRepository,
    gate: Option<Arc<dyn PromotionGate>>,
    slot: Mutex<()>,
    last_run: parking_lot::Mutex<Option<RetrainSummary>>,
}

impl TrainingPipeline {
    pub fn new(store: Arc<ModelStore>, feedback: FeedbackRepository, feeds: FeedRepository) -> Self {
        Self {
            store,
            feedback,
            feeds,
            gate: None,
            slot: Mutex::new(()),
            last_run: parking_lot::Mutex::new(None),
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn PromotionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn is_running(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    pub fn last_run(&self) -> Option<RetrainSummary> {
        self.last_run.lock().clone()
    }

    /// Resolves once no retrain is in flight.
    pub async fn wait_idle(&self) {
        let _slot = self.slot.lock().await;
    }

    /// Retrains on every feedback row and feed entry currently persisted.
    pub async fn retrain_from_store(&self) -> Result<RetrainOutcome, TrainingError> {
        let _slot = self.slot.try_lock().map_err(|_| TrainingError::InProgress)?;
        let feedback = self.feedback.list_all().await?;
        let feeds = self.feeds.list_all().await?;
        self.record(self.run(&feedback, &feeds).await)
    }

    pub async fn retrain(
        &self,
        feedback: &[FeedbackRecord],
        feeds: &[FeedEntry],
    ) -> Result<RetrainOutcome, TrainingError> {
        let _slot = self.slot.try_lock().map_err(|_| TrainingError::InProgress)?;
        self.record(self.run(feedback, feeds).await)
    }

    async fn run(
        &self,
        feedback: &[FeedbackRecord],
        feeds: &[FeedEntry],
    ) -> Result<RetrainOutcome, TrainingError> {
        let assembled = assemble_dataset(feedback, feeds);
        if assembled.is_empty() {
            tracing::info!(
                target: "training",
                "no feedback or feed entries available; retrain skipped, active model kept"
            );
            return Ok(RetrainOutcome::Skipped);
        }

        tracing::info!(
            target: "training",
            feedback = feedback.len(),
            feed_entries = feeds.len(),
            seed = self.store.seed_corpus().len(),
            "retraining model"
        );

        let mut examples = self.store.seed_corpus().to_vec();
        examples.extend(assembled);
        let params = *self.store.params();
        let candidate = tokio::task::spawn_blocking(move || fit(&examples, &params))
            .await
            .map_err(ModelError::from)??;

        if let Some(gate) = &self.gate {
            let active = self.store.current();
            if let Err(reason) = gate.review(&candidate, active.as_deref()) {
                tracing::warn!(
                    target: "training",
                    artifact_id = %candidate.artifact_id,
                    reason = %reason,
                    "candidate model rejected by promotion gate"
                );
                return Ok(RetrainOutcome::Rejected {
                    artifact_id: candidate.artifact_id,
                    reason,
                });
            }
        }

        let artifact_id = candidate.artifact_id.clone();
        let examples = candidate.examples;
        self.store.replace(candidate).await?;
        tracing::info!(target: "training", artifact_id = %artifact_id, examples, "retrained model promoted");
        Ok(RetrainOutcome::Promoted {
            artifact_id,
            examples,
        })
    }

    fn record(
        &self,
        result: Result<RetrainOutcome, TrainingError>,
    ) -> Result<RetrainOutcome, TrainingError> {
        if let Err(err) = &result {
            tracing::error!(target: "training", error = %err, "retrain failed; active model kept");
        }
        *self.last_run.lock() = Some(RetrainSummary {
            finished_at: Utc::now(),
            result: result
                .as_ref()
                .map(Clone::clone)
                .map_err(|err| err.to_string()),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{db::memory_pool, domain::FeedSource, model::TrainingParams, training::bundled_seed_corpus};

    async fn pipeline(dir: &Path) -> (TrainingPipeline, Arc<ModelStore>, FeedbackRepository, FeedRepository) {
        let pool = memory_pool().await;
        let store = Arc::new(ModelStore::new(
            dir.join("model"),
            bundled_seed_corpus(),
            TrainingParams::default(),
        ));
        let feedback = FeedbackRepository::new(pool.clone());
        let feeds = FeedRepository::new(pool);
        (
            TrainingPipeline::new(store.clone(), feedback.clone(), feeds.clone()),
            store,
            feedback,
            feeds,
        )
    }

    fn feedback(text: &str, is_phishing: bool) -> FeedbackRecord {
        FeedbackRecord {
            url_or_text: text.to_string(),
            is_phishing,
            submitted_at: Utc::now(),
        }
    }

    fn feed(url: &str) -> FeedEntry {
        FeedEntry {
            url: url.to_string(),
            source: FeedSource::FeedB,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn dataset_keeps_feedback_labels_and_marks_feeds_positive() {
        let rows = assemble_dataset(
            &[feedback("http://a.example", false), feedback("  ", true), feedback("http://b.example", true)],
            &[feed("http://c.example")],
        );
        assert_eq!(
            rows,
            vec![
                TrainingExample::new("http://a.example", false),
                TrainingExample::new("http://b.example", true),
                TrainingExample::new("http://c.example", true),
            ]
        );
    }

    #[tokio::test]
    async fn empty_inputs_skip_and_keep_active_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, store, _, _) = pipeline(tmp.path()).await;
        let active = store.load_or_train().await.unwrap();

        let outcome = pipeline.retrain(&[], &[]).await.unwrap();
        assert_eq!(outcome, RetrainOutcome::Skipped);
        assert!(Arc::ptr_eq(&active, &store.current().unwrap()));
        assert!(matches!(
            pipeline.last_run().unwrap().result,
            Ok(RetrainOutcome::Skipped)
        ));
    }

    #[tokio::test]
    async fn feed_only_data_still_trains_with_seed() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, store, _, _) = pipeline(tmp.path()).await;

        let outcome = pipeline
            .retrain(&[], &[feed("http://account-verify-paypal.example/login")])
            .await
            .unwrap();
        let RetrainOutcome::Promoted { artifact_id, examples } = outcome.clone() else {
            panic!("expected promotion, got {outcome:?}");
        };
        assert_eq!(examples, bundled_seed_corpus().len() + 1);
        assert_eq!(store.current().unwrap().artifact_id, artifact_id);
    }

    #[tokio::test]
    async fn retraining_on_same_data_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, store, _, _) = pipeline(tmp.path()).await;
        let rows = [feedback("http://intranet.example/payroll", false), feedback("http://verify-login.example", true)];
        let feeds = [feed("http://secure-update.example/account")];
        let samples = ["http://verify-login.example", "https://www.github.com", "", "http://intranet.example"];

        pipeline.retrain(&rows, &feeds).await.unwrap();
        let first: Vec<f64> = samples.iter().map(|p| store.current().unwrap().score(p)).collect();
        pipeline.retrain(&rows, &feeds).await.unwrap();
        let second: Vec<f64> = samples.iter().map(|p| store.current().unwrap().score(p)).collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_retrain_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, store, _, _) = pipeline(tmp.path()).await;
        let active = store.load_or_train().await.unwrap();

        let held = pipeline.slot.try_lock().unwrap();
        assert!(pipeline.is_running());
        let err = pipeline.retrain(&[], &[feed("http://x.example")]).await.unwrap_err();
        assert!(matches!(err, TrainingError::InProgress));
        drop(held);

        assert!(!pipeline.is_running());
        assert!(Arc::ptr_eq(&active, &store.current().unwrap()));
    }

    struct RejectAll;

    impl PromotionGate for RejectAll {
        fn review(&self, _: &ModelArtifact, _: Option<&ModelArtifact>) -> Result<(), String> {
            Err("held-out accuracy regressed".into())
        }
    }

    #[tokio::test]
    async fn gate_rejection_keeps_active_model() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, store, _, _) = pipeline(tmp.path()).await;
        let pipeline = pipeline.with_gate(Arc::new(RejectAll));
        let active = store.load_or_train().await.unwrap();

        let outcome = pipeline.retrain(&[], &[feed("http://x.example")]).await.unwrap();
        assert!(matches!(outcome, RetrainOutcome::Rejected { .. }));
        assert!(Arc::ptr_eq(&active, &store.current().unwrap()));
    }

    #[tokio::test]
    async fn retrain_from_store_uses_persisted_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, store, feedback_repo, feed_repo) = pipeline(tmp.path()).await;
        assert_eq!(pipeline.retrain_from_store().await.unwrap(), RetrainOutcome::Skipped);

        feedback_repo.record("http://reset-password-now.example", true).await.unwrap();
        feedback_repo.record("https://docs.example/handbook", false).await.unwrap();
        feed_repo.insert_if_absent(&feed("http://wallet-unlock.example")).await.unwrap();

        let outcome = pipeline.retrain_from_store().await.unwrap();
        assert!(matches!(outcome, RetrainOutcome::Promoted { examples, .. } if examples == bundled_seed_corpus().len() + 3));
        assert!(store.current().unwrap().score("http://reset-password-now.example") > 0.5);
    }

    #[tokio::test]
    async fn failed_persist_surfaces_and_keeps_model() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, store, _, _) = pipeline(tmp.path()).await;
        let active = store.load_or_train().await.unwrap();

        std::fs::remove_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir(), b"blocked").unwrap();

        let err = pipeline.retrain(&[], &[feed("http://x.example")]).await.unwrap_err();
        assert!(matches!(err, TrainingError::Model(ModelError::Persist { .. })));
        assert!(Arc::ptr_eq(&active, &store.current().unwrap()));
        assert!(pipeline.last_run().unwrap().result.is_err());
    }
}
