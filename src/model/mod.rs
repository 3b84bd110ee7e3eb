pub mod artifact;
pub mod classifier;
pub mod error;
pub mod store;
pub mod vectorizer;

pub use artifact::{fit, ModelArtifact, CLASSIFIER_THRESHOLD};
pub use classifier::{LogisticRegression, TrainingParams};
pub use error::ModelError;
pub use store::ModelStore;
pub use vectorizer::{FeatureVector, TfidfVectorizer};
