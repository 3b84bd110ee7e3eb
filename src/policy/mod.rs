pub mod decision;

pub use decision::{decide, ScanState, Verdict, HEURISTIC_FALLBACK_CONFIDENCE};
