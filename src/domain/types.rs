use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub label: bool,
}

impl TrainingExample {
    pub fn new(text: impl Into<String>, label: bool) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Subject,
    Sender,
    InsecureLink,
    Keyword,
}

impl FindingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::Subject => "subject",
            FindingCategory::Sender => "sender",
            FindingCategory::InsecureLink => "insecure_link",
            FindingCategory::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicFinding {
    pub category: FindingCategory,
    pub detail: String,
}

impl fmt::Display for HeuristicFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category.as_str(), self.detail)
    }
}

/// Upstream phishing feed a URL was first observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedSource {
    /// PhishTank CSV export.
    FeedA,
    /// OpenPhish plain-text list.
    FeedB,
}

impl FeedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSource::FeedA => "phishtank",
            FeedSource::FeedB => "openphish",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "phishtank" => Some(FeedSource::FeedA),
            "openphish" => Some(FeedSource::FeedB),
            _ => None,
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub url: String,
    pub source: FeedSource,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub url_or_text: String,
    pub is_phishing: bool,
    pub submitted_at: DateTime<Utc>,
}
