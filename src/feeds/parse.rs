use super::FeedError;
use crate::domain::FeedSource;

/// Extracts the `url` column from a CSV export with a header row.
pub fn parse_csv_feed(body: &str) -> Result<Vec<String>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers().map_err(|err| parse_error(err.to_string()))?;
    let url_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("url"))
        .ok_or_else(|| parse_error("header has no url column".to_string()))?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| parse_error(err.to_string()))?;
        if let Some(url) = record.get(url_col).map(str::trim).filter(|u| !u.is_empty()) {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are skipped.
pub fn parse_plain_feed(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn parse_error(reason: String) -> FeedError {
    FeedError::UpstreamFetch {
        feed: FeedSource::FeedA,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_feed_reads_url_column_by_name() {
        let body = "phish_id,url,phish_detail_url,verified\n\
                    1,http://a.example/login,https://phishtank.example/1,yes\n\
                    2,\"http://b.example/?q=1,2\",https://phishtank.example/2,yes\n\
                    3,,https://phishtank.example/3,no\n";
        assert_eq!(
            parse_csv_feed(body).unwrap(),
            vec!["http://a.example/login", "http://b.example/?q=1,2"]
        );
    }

    #[test]
    fn csv_feed_without_url_header_is_an_error() {
        let err = parse_csv_feed("id,link\n1,http://a.example\n").unwrap_err();
        assert!(matches!(err, FeedError::UpstreamFetch { feed: FeedSource::FeedA, .. }));
    }

    #[test]
    fn plain_feed_skips_blanks_and_comments() {
        let body = "# openphish\nhttp://a.example\n\n  http://b.example  \r\n";
        assert_eq!(parse_plain_feed(body), vec!["http://a.example", "http://b.example"]);
    }
}
