use crate::{
    domain::{HeuristicFinding, PredictionResult},
    model::CLASSIFIER_THRESHOLD,
};

/// Confidence reported when only the heuristics flagged an email. The
/// classifier gives no calibrated probability for these cases, so a fixed
/// value is reported instead; it has no calibration basis of its own.
pub const HEURISTIC_FALLBACK_CONFIDENCE: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub prediction: PredictionResult,
    pub quarantine: bool,
}

/// Lifecycle of a single verdict: `Unscanned` moves to `Scanned` exactly once.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScanState {
    #[default]
    Unscanned,
    Scanned(Verdict),
}

impl ScanState {
    /// Resolves the verdict and returns it with the new state. `findings` is
    /// `None` for bare URL scans, where no metadata exists. An already scanned
    /// state keeps its verdict and ignores the new inputs.
    pub fn resolve(self, probability: f64, findings: Option<&[HeuristicFinding]>) -> (Self, Verdict) {
        let verdict = match self {
            ScanState::Unscanned => decide(probability, findings),
            ScanState::Scanned(verdict) => verdict,
        };
        (ScanState::Scanned(verdict.clone()), verdict)
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            ScanState::Unscanned => None,
            ScanState::Scanned(verdict) => Some(verdict),
        }
    }
}

pub fn decide(probability: f64, findings: Option<&[HeuristicFinding]>) -> Verdict {
    let classifier_flag = probability > CLASSIFIER_THRESHOLD;

    match findings {
        None => Verdict {
            prediction: PredictionResult {
                label: classifier_flag,
                confidence: probability,
            },
            quarantine: false,
        },
        Some(findings) => {
            let label = classifier_flag || !findings.is_empty();
            let confidence = if label && !classifier_flag {
                HEURISTIC_FALLBACK_CONFIDENCE
            } else {
                probability
            };
            Verdict {
                prediction: PredictionResult { label, confidence },
                quarantine: label,
            }
        }
    }
}
