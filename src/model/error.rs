use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(
        "insufficient training data: {examples} examples ({positives} phishing / {negatives} legitimate), need at least 2 covering both labels"
    )]
    InsufficientTrainingData {
        examples: usize,
        positives: usize,
        negatives: usize,
    },
    #[error("failed to persist model artifact to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read model artifact at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("model artifact at {} is unusable: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("model task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ModelError {
    pub(crate) fn persist(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| ModelError::Persist { path, source }
    }
}
