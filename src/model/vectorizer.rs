use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid token regex"));

/// Sparse row: `(vocabulary index, weight)` pairs in ascending index order.
pub type FeatureVector = Vec<(usize, f64)>;

/// Term-frequency / inverse-document-frequency transform over word tokens.
///
/// Tokens are lowercased runs of two or more word characters. Vocabulary
/// indices follow lexicographic token order so that the same corpus always
/// produces the same feature layout. IDF is smoothed as
/// `ln((1 + n) / (1 + df)) + 1` and every row is L2-normalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for document in documents {
            let unique: BTreeSet<String> = tokenize(document.as_ref()).collect();
            for token in unique {
                *document_frequency.entry(token).or_default() += 1;
            }
        }

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (token, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(token, index);
        }

        Self { vocabulary, idf }
    }

    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.vocabulary.get(token).copied()
    }

    /// Projects `text` into the fitted vocabulary. Unknown tokens are dropped,
    /// so text without any known token maps to the empty (zero) vector.
    pub fn transform(&self, text: &str) -> FeatureVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                *counts.entry(index).or_default() += 1.0;
            }
        }

        let mut row: FeatureVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, weight) in row.iter_mut() {
                *weight /= norm;
            }
        }
        row
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    TOKEN_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_sorted_and_lowercased() {
        let vectorizer = TfidfVectorizer::fit(&["Login PAYPAL", "paypal security"]);
        assert_eq!(vectorizer.dimension(), 3);
        assert_eq!(vectorizer.index_of("login"), Some(0));
        assert_eq!(vectorizer.index_of("paypal"), Some(1));
        assert_eq!(vectorizer.index_of("security"), Some(2));
        assert_eq!(vectorizer.index_of("PAYPAL"), None);
    }

    #[test]
    fn single_character_tokens_are_ignored() {
        let vectorizer = TfidfVectorizer::fit(&["a b cd"]);
        assert_eq!(vectorizer.dimension(), 1);
        assert!(vectorizer.index_of("cd").is_some());
    }

    #[test]
    fn smoothed_idf_weights_rare_terms_higher() {
        let vectorizer = TfidfVectorizer::fit(&["http example com", "http phish com"]);
        let row = vectorizer.transform("http phish");
        let http = vectorizer.index_of("http").unwrap();
        let phish = vectorizer.index_of("phish").unwrap();
        let weight = |idx: usize| row.iter().find(|(i, _)| *i == idx).unwrap().1;
        assert!(weight(phish) > weight(http));
        assert!((vectorizer.idf[http] - 1.0).abs() < 1e-12);
        assert!((vectorizer.idf[phish] - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn rows_are_unit_length() {
        let vectorizer = TfidfVectorizer::fit(&["secure login bank", "weather report"]);
        let row = vectorizer.transform("secure secure login unknown");
        let norm: f64 = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_and_empty_text_map_to_zero_vector() {
        let vectorizer = TfidfVectorizer::fit(&["secure login"]);
        assert!(vectorizer.transform("").is_empty());
        assert!(vectorizer.transform("completely novel words").is_empty());
    }
}
