use std::collections::HashSet;

use chrono::Utc;
use reqwest::Client;

use super::{FeedError, parse_csv_feed, parse_plain_feed};
use crate::{
    config::FeedConfig,
    db::FeedRepository,
    domain::{FeedEntry, FeedSource},
};

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// URLs each source returned, before deduplication.
    pub from_a: usize,
    pub from_b: usize,
    /// Entries that were not known before this run.
    pub new_entries: Vec<FeedEntry>,
}

pub struct FeedIngestor {
    client: Client,
    config: FeedConfig,
    repository: FeedRepository,
}

impl FeedIngestor {
    pub fn new(client: Client, config: FeedConfig, repository: FeedRepository) -> Self {
        Self {
            client,
            config,
            repository,
        }
    }

    /// Fetches both feeds concurrently and stores the URLs not seen before in
    /// one transaction. A failing source is logged and contributes nothing; a
    /// failed write keeps no rows. This never fails.
    pub async fn fetch_all(&self) -> IngestReport {
        let (feed_a, feed_b) = tokio::join!(
            self.fetch_source(FeedSource::FeedA),
            self.fetch_source(FeedSource::FeedB)
        );

        let feed_a = recover(FeedSource::FeedA, feed_a);
        let feed_b = recover(FeedSource::FeedB, feed_b);
        let mut report = IngestReport {
            from_a: feed_a.len(),
            from_b: feed_b.len(),
            new_entries: Vec::new(),
        };

        let observed_at = Utc::now();
        let entries = merge_sources(feed_a, feed_b)
            .into_iter()
            .map(|(url, source)| FeedEntry {
                url,
                source,
                observed_at,
            })
            .collect::<Vec<_>>();
        let merged = entries.len();
        match self.repository.insert_all(entries).await {
            Ok(inserted) => report.new_entries = inserted,
            Err(err) => {
                tracing::error!(target: "feeds", error = %err, merged, "failed to store feed refresh; nothing kept");
            }
        }

        tracing::info!(
            target: "feeds",
            from_a = report.from_a,
            from_b = report.from_b,
            new_entries = report.new_entries.len(),
            "feed refresh finished"
        );
        report
    }

    async fn fetch_source(&self, source: FeedSource) -> Result<Vec<String>, FeedError> {
        let url = match source {
            FeedSource::FeedA => &self.config.phishtank_url,
            FeedSource::FeedB => &self.config.openphish_url,
        };
        let upstream = |err: reqwest::Error| FeedError::UpstreamFetch {
            feed: source,
            reason: err.to_string(),
        };

        let body = self
            .client
            .get(url.as_str())
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?
            .text()
            .await
            .map_err(upstream)?;

        match source {
            FeedSource::FeedA => parse_csv_feed(&body),
            FeedSource::FeedB => Ok(parse_plain_feed(&body)),
        }
    }
}

fn recover(source: FeedSource, result: Result<Vec<String>, FeedError>) -> Vec<String> {
    result.unwrap_or_else(|err| {
        tracing::warn!(target: "feeds", source = %source, error = %err, "feed source skipped");
        Vec::new()
    })
}

/// Interleaves both feeds into one list keyed by the literal URL. FeedA is
/// walked first, so a URL present in both keeps FeedA as its source.
pub fn merge_sources(feed_a: Vec<String>, feed_b: Vec<String>) -> Vec<(String, FeedSource)> {
    let mut seen = HashSet::new();
    feed_a
        .into_iter()
        .map(|url| (url, FeedSource::FeedA))
        .chain(feed_b.into_iter().map(|url| (url, FeedSource::FeedB)))
        .filter(|(url, _)| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::db::memory_pool;

    async fn ingestor(server: &MockServer, timeout: Duration) -> (FeedIngestor, FeedRepository) {
        let repository = FeedRepository::new(memory_pool().await);
        let config = FeedConfig {
            phishtank_url: format!("{}/online-valid.csv", server.uri()),
            openphish_url: format!("{}/feed.txt", server.uri()),
            fetch_timeout: timeout,
        };
        (
            FeedIngestor::new(Client::new(), config, repository.clone()),
            repository,
        )
    }

    #[test]
    fn merge_keeps_first_source_for_shared_urls() {
        let merged = merge_sources(
            vec!["http://x.example".into(), "http://y.example".into(), "http://x.example".into()],
            vec!["http://x.example".into(), "http://z.example".into()],
        );
        assert_eq!(
            merged,
            vec![
                ("http://x.example".to_string(), FeedSource::FeedA),
                ("http://y.example".to_string(), FeedSource::FeedA),
                ("http://z.example".to_string(), FeedSource::FeedB),
            ]
        );
    }

    #[tokio::test]
    async fn overlapping_url_is_stored_once_with_first_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/online-valid.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("phish_id,url\n1,http://x.example\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("http://x.example\nhttp://w.example\n"))
            .mount(&server)
            .await;

        let (ingestor, repository) = ingestor(&server, Duration::from_secs(5)).await;
        let report = ingestor.fetch_all().await;
        assert_eq!((report.from_a, report.from_b), (1, 2));
        assert_eq!(report.new_entries.len(), 2);

        let stored = repository.list_all().await.unwrap();
        let x = stored.iter().find(|e| e.url == "http://x.example").unwrap();
        assert_eq!(x.source, FeedSource::FeedA);
        assert_eq!(repository.count().await.unwrap(), 2);

        let again = ingestor.fetch_all().await;
        assert!(again.new_entries.is_empty());
        assert_eq!(repository.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failing_source_does_not_block_the_other() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/online-valid.csv"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("http://only-b.example\n"))
            .mount(&server)
            .await;

        let (ingestor, _) = ingestor(&server, Duration::from_secs(5)).await;
        let report = ingestor.fetch_all().await;
        assert_eq!(report.from_a, 0);
        assert_eq!(report.new_entries.len(), 1);
        assert_eq!(report.new_entries[0].source, FeedSource::FeedB);
    }

    #[tokio::test]
    async fn failed_store_reports_no_new_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/online-valid.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("url\nhttp://a.example\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("http://b.example\n"))
            .mount(&server)
            .await;

        let pool = memory_pool().await;
        sqlx::query(
            "CREATE TRIGGER reject_b BEFORE INSERT ON feed_entries \
             WHEN NEW.url = 'http://b.example' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        let repository = FeedRepository::new(pool);
        let config = FeedConfig {
            phishtank_url: format!("{}/online-valid.csv", server.uri()),
            openphish_url: format!("{}/feed.txt", server.uri()),
            fetch_timeout: Duration::from_secs(5),
        };
        let ingestor = FeedIngestor::new(Client::new(), config, repository.clone());

        let report = ingestor.fetch_all().await;
        assert_eq!((report.from_a, report.from_b), (1, 1));
        assert!(report.new_entries.is_empty());
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/online-valid.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("url\nhttp://late.example\n")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("http://fast.example\n"))
            .mount(&server)
            .await;

        let (ingestor, _) = ingestor(&server, Duration::from_millis(200)).await;
        let report = ingestor.fetch_all().await;
        assert_eq!(report.from_a, 0);
        assert_eq!(
            report.new_entries.iter().map(|e| e.url.as_str()).collect::<Vec<_>>(),
            vec!["http://fast.example"]
        );
    }
}
