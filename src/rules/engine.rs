use crate::domain::{FindingCategory, HeuristicFinding};

use super::links::is_insecure;

pub const SUBJECT_PHRASES: &[&str] = &[
    "urgent",
    "verify your account",
    "verify your identity",
    "action required",
    "account suspended",
    "account locked",
    "password expired",
    "confirm your",
    "unusual activity",
    "security alert",
    "final notice",
    "immediately",
];

/// Deliberately coarse: legitimate transactional senders match too.
pub const SENDER_KEYWORDS: &[&str] = &[
    "bank",
    "security",
    "support",
    "alert",
    "no-reply",
    "noreply",
    "do-not-reply",
    "donotreply",
];

pub const BODY_PHRASES: &[&str] = &[
    "verify your account",
    "confirm your password",
    "update your payment",
    "click here",
    "login to your account",
    "log in to your account",
    "your account has been suspended",
    "your account will be closed",
    "unusual sign-in activity",
    "reset your password",
    "social security number",
    "wire transfer",
    "gift card",
    "credit card number",
];

/// Runs every heuristic check over the email metadata.
///
/// Findings only ever accumulate: an empty result means no heuristic fired,
/// not that the message is safe.
pub fn evaluate(
    subject: &str,
    sender: &str,
    body_text: &str,
    extracted_urls: &[String],
) -> Vec<HeuristicFinding> {
    let mut findings = Vec::new();

    let subject_hits = matches(subject, SUBJECT_PHRASES);
    if !subject_hits.is_empty() {
        findings.push(HeuristicFinding {
            category: FindingCategory::Subject,
            detail: format!("suspicious subject phrasing: {}", subject_hits.join(", ")),
        });
    }

    let sender_hits = matches(sender, SENDER_KEYWORDS);
    if !sender_hits.is_empty() {
        findings.push(HeuristicFinding {
            category: FindingCategory::Sender,
            detail: format!(
                "sender {} matches impersonation keywords: {}",
                sender.trim(),
                sender_hits.join(", ")
            ),
        });
    }

    for url in extracted_urls.iter().filter(|url| is_insecure(url)) {
        findings.push(HeuristicFinding {
            category: FindingCategory::InsecureLink,
            detail: format!("insecure link: {url}"),
        });
    }

    let body_hits = matches(body_text, BODY_PHRASES);
    if !body_hits.is_empty() {
        findings.push(HeuristicFinding {
            category: FindingCategory::Keyword,
            detail: format!("phishing phrases in body: {}", body_hits.join(", ")),
        });
    }

    findings
}

fn matches<'a>(haystack: &str, needles: &[&'a str]) -> Vec<&'a str> {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .copied()
        .filter(|needle| haystack.contains(needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(findings: &[HeuristicFinding]) -> Vec<FindingCategory> {
        findings.iter().map(|f| f.category).collect()
    }

    #[test]
    fn clean_message_has_no_findings() {
        let findings = evaluate(
            "Lunch on Friday?",
            "alice@example.com",
            "See you at noon.",
            &["https://maps.example.com".to_string()],
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn subject_match_is_case_insensitive() {
        let findings = evaluate("Urgent: Verify your account", "friend@example.com", "", &[]);
        assert_eq!(categories(&findings), vec![FindingCategory::Subject]);
        assert!(findings[0].detail.contains("urgent"));
        assert!(findings[0].detail.contains("verify your account"));
    }

    #[test]
    fn sender_check_flags_transactional_senders_too() {
        let findings = evaluate("Your receipt", "No-Reply@shop.example", "", &[]);
        assert_eq!(categories(&findings), vec![FindingCategory::Sender]);
    }

    #[test]
    fn each_insecure_link_is_reported_separately() {
        let urls = vec![
            "http://one.example/login".to_string(),
            "https://two.example".to_string(),
            "http://three.example".to_string(),
        ];
        let findings = evaluate("", "", "", &urls);
        assert_eq!(
            categories(&findings),
            vec![FindingCategory::InsecureLink, FindingCategory::InsecureLink]
        );
        assert!(findings[1].detail.contains("three.example"));
    }

    #[test]
    fn body_keywords_are_grouped_into_one_finding() {
        let findings = evaluate(
            "",
            "",
            "Click here to verify your account and buy a gift card.",
            &[],
        );
        assert_eq!(categories(&findings), vec![FindingCategory::Keyword]);
        let detail = &findings[0].detail;
        for phrase in ["click here", "verify your account", "gift card"] {
            assert!(detail.contains(phrase), "{detail}");
        }
    }

    #[test]
    fn adding_keywords_never_removes_findings() {
        let base_body = "Please click here.";
        let richer_body = "Please click here. Then reset your password and send a wire transfer.";
        let urls = vec!["http://x.example".to_string()];

        let before = evaluate("Security alert", "support@x.example", base_body, &urls);
        let after = evaluate("Security alert", "support@x.example", richer_body, &urls);

        for finding in &before {
            assert!(
                after.iter().any(|f| f.category == finding.category),
                "lost {finding}"
            );
        }
        let keyword = |fs: &[HeuristicFinding]| {
            fs.iter()
                .find(|f| f.category == FindingCategory::Keyword)
                .map(|f| f.detail.clone())
                .unwrap()
        };
        assert!(keyword(&after).contains("click here"));
        assert!(keyword(&after).len() > keyword(&before).len());
    }
}
