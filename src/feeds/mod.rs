mod ingestor;
mod parse;

use thiserror::Error;

use crate::domain::FeedSource;

pub use ingestor::{FeedIngestor, IngestReport, merge_sources};
pub use parse::{parse_csv_feed, parse_plain_feed};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to fetch {feed} feed: {reason}")]
    UpstreamFetch { feed: FeedSource, reason: String },
}
