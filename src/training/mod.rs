pub mod pipeline;
pub mod seed;

pub use pipeline::{
    assemble_dataset, PromotionGate, RetrainOutcome, RetrainSummary, TrainingError,
    TrainingPipeline,
};
pub use seed::{bundled_seed_corpus, load_seed_csv};
