pub mod message;
pub mod types;

pub use message::{EmailScan, ScanReport};
pub use types::{
    FeedEntry, FeedSource, FeedbackRecord, FindingCategory, HeuristicFinding, PredictionResult,
    TrainingExample,
};
