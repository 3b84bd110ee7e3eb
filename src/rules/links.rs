use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://[^\s<>]+").expect("valid url regex"));

pub fn extract_urls(text: &str) -> Vec<String> {
    URL_REGEX
        .find_iter(text)
        .map(|m| normalize_url(m.as_str()))
        .filter(|url| !url.is_empty())
        .collect()
}

/// True when the link uses plain `http`. Unparseable links fall back to a
/// prefix check so a malformed `http://` link is still reported.
pub fn is_insecure(link: &str) -> bool {
    match Url::parse(link.trim()) {
        Ok(url) => url.scheme() == "http",
        Err(_) => link.trim().to_ascii_lowercase().starts_with("http://"),
    }
}

fn normalize_url(raw: &str) -> String {
    let mut cleaned = raw.trim_end_matches(char::is_whitespace).to_string();
    while let Some(last) = cleaned.chars().last() {
        let should_trim = match last {
            ')' => !cleaned.contains('('),
            ']' => !cleaned.contains('['),
            '}' => !cleaned.contains('{'),
            '"' => count_char(&cleaned, '"') % 2 == 1,
            '\'' => count_char(&cleaned, '\'') % 2 == 1,
            ',' | '.' | '!' | '?' | ';' | ':' => true,
            _ => false,
        };
        if should_trim {
            cleaned.pop();
        } else {
            break;
        }
    }
    cleaned
}

fn count_char(value: &str, needle: char) -> usize {
    value.chars().filter(|ch| *ch == needle).count()
}
