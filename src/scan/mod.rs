mod service;

pub use service::{ScanError, ScanService};
