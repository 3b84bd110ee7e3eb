use chrono::{DateTime, Utc};

use crate::domain::{PredictionResult, TrainingExample};

use super::{
    classifier::{LogisticRegression, TrainingParams},
    error::ModelError,
    vectorizer::{FeatureVector, TfidfVectorizer},
};

/// Probability above which the classifier alone calls content phishing.
pub const CLASSIFIER_THRESHOLD: f64 = 0.5;

/// A fitted vectorizer and the classifier trained on its feature space.
///
/// The two halves are only ever built together by [`fit`], which keeps the
/// classifier dimension equal to the vocabulary size. Artifacts are immutable;
/// retraining produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub artifact_id: String,
    pub vectorizer: TfidfVectorizer,
    pub classifier: LogisticRegression,
    pub trained_at: DateTime<Utc>,
    pub examples: usize,
}

impl ModelArtifact {
    pub fn features(&self, text: &str) -> FeatureVector {
        self.vectorizer.transform(text)
    }

    /// Phishing probability for `text`. Always in `[0, 1]`, identical for
    /// identical input against the same artifact.
    pub fn score(&self, text: &str) -> f64 {
        self.classifier.probability(&self.features(text))
    }

    pub fn predict(&self, text: &str) -> PredictionResult {
        let confidence = self.score(text);
        PredictionResult {
            label: confidence > CLASSIFIER_THRESHOLD,
            confidence,
        }
    }
}

pub fn fit(
    examples: &[TrainingExample],
    params: &TrainingParams,
) -> Result<ModelArtifact, ModelError> {
    let positives = examples.iter().filter(|e| e.label).count();
    let negatives = examples.len() - positives;
    if examples.len() < 2 || positives == 0 || negatives == 0 {
        return Err(ModelError::InsufficientTrainingData {
            examples: examples.len(),
            positives,
            negatives,
        });
    }

    let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
    let labels: Vec<bool> = examples.iter().map(|e| e.label).collect();

    let vectorizer = TfidfVectorizer::fit(&texts);
    let rows: Vec<FeatureVector> = texts.iter().map(|t| vectorizer.transform(t)).collect();
    let classifier = LogisticRegression::fit(&rows, &labels, vectorizer.dimension(), params);

    let trained_at = Utc::now();
    let artifact_id = format!(
        "{:x}-{}",
        trained_at.timestamp_nanos_opt().unwrap_or_default(),
        examples.len()
    );

    tracing::info!(
        target: "model",
        artifact_id = %artifact_id,
        examples = examples.len(),
        positives,
        negatives,
        vocabulary = vectorizer.dimension(),
        "model fitted"
    );

    Ok(ModelArtifact {
        artifact_id,
        vectorizer,
        classifier,
        trained_at,
        examples: examples.len(),
    })
}
