use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::domain::TrainingExample;

const SAFE_URLS: &[&str] = &[
    "http://example.com",
    "http://safe-site.com",
    "https://www.google.com",
    "https://www.wikipedia.org",
    "https://www.github.com",
    "https://www.microsoft.com",
    "https://www.apple.com",
    "https://www.amazon.com",
    "https://www.mozilla.org",
    "https://www.python.org",
    "https://www.rust-lang.org",
    "https://docs.rs",
    "https://www.bbc.co.uk",
    "https://news.ycombinator.com",
    "https://www.stackoverflow.com",
];

const PHISHING_URLS: &[&str] = &[
    "http://malicious.xyz/phish",
    "http://www.testingmcafeesites.com/testcat_ph.html",
    "http://phishingsite.com",
    "http://malicious-link.net",
    "http://fakebank-login.com",
    "http://paypal-security-alert.com",
    "http://update-your-account.com",
    "http://secure-appleid.com",
    "http://login-facebook-support.com",
];

/// Ordinary mail bodies. Keeps the fitted prior below 0.5, so text sharing
/// no token with the corpus is not flagged by the classifier.
const SAFE_TEXTS: &[&str] = &[
    "Hi team, the meeting notes from Tuesday are attached.",
    "Are we still on for lunch on Friday?",
    "Your order has shipped and should arrive next week.",
    "Thanks for the review, I pushed the requested changes.",
    "Reminder: the office is closed on Monday for the holiday.",
    "Here is the agenda for tomorrow's planning session.",
    "Can you send me the slides from the conference talk?",
    "The quarterly report draft is ready for comments.",
    "Happy birthday! Hope you have a great day.",
    "Please find the invoice for last month attached, payable within 30 days.",
];

const PHISHING_TEXTS: &[&str] = &[
    "Your account has been suspended, verify your identity immediately.",
    "Urgent: confirm your password to avoid account closure.",
    "We detected unusual sign-in activity, click here to secure your account.",
    "Your payment failed, update your billing information now.",
    "You have won a gift card, claim your reward before it expires.",
];

/// Small labeled corpus compiled into the binary, used when no seed file is
/// configured.
pub fn bundled_seed_corpus() -> Vec<TrainingExample> {
    let safe = SAFE_URLS.iter().chain(SAFE_TEXTS).map(|text| TrainingExample::new(*text, false));
    let phishing = PHISHING_URLS
        .iter()
        .chain(PHISHING_TEXTS)
        .map(|text| TrainingExample::new(*text, true));
    safe.chain(phishing).collect()
}

/// Reads a labeled CSV with `URL` and `Label` columns (header names are
/// matched case-insensitively). Labels accept `1/0`, `true/false`,
/// `phishing/legitimate` and `bad/good`; rows with any other label are skipped.
pub fn load_seed_csv(path: &Path) -> Result<Vec<TrainingExample>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open seed corpus {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let (Some(url_col), Some(label_col)) = (column("url"), column("label")) else {
        bail!("seed corpus {} needs URL and Label columns", path.display());
    };

    let mut examples = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let url = record.get(url_col).map(str::trim).unwrap_or_default();
        match (url.is_empty(), record.get(label_col).and_then(parse_label)) {
            (false, Some(label)) => examples.push(TrainingExample::new(url, label)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(
            target: "training",
            skipped,
            path = %path.display(),
            "skipped seed rows without a usable URL or label"
        );
    }
    Ok(examples)
}

fn parse_label(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "phishing" | "bad" => Some(true),
        "0" | "false" | "legitimate" | "good" => Some(false),
        _ => None,
    }
}
