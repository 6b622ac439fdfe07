//! Query relevance scoring for extracted documents.
//!
//! The default [`KeywordScorer`] blends keyword density with keyword
//! coverage:
//!
//! ```text
//! score = min(1, 0.4 * hits / (words * keywords) + 0.6 * present / keywords)
//! ```
//!
//! where `hits` counts every occurrence of every keyword in the text and
//! `present` counts distinct keywords that occur at least once.

/// Upper bound on keywords derived from one query.
const MAX_KEYWORDS: usize = 10;

const DENSITY_WEIGHT: f64 = 0.4;
const COVERAGE_WEIGHT: f64 = 0.6;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "before", "but", "by",
    "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "how", "i", "if", "in", "into", "is",
    "it", "its", "me", "more", "most", "my", "new", "no", "not", "of", "on", "or", "our", "out", "over", "so",
    "some", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to", "up", "us",
    "was", "we", "were", "what", "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Scores how relevant a document's text is to a query, in `[0, 1]`.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, query: &str, text: &str) -> f64;
}

/// Keyword density and coverage scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

/// Query keywords: non-stopword tokens plus adjacent-pair phrases,
/// longest first, at most ten.
pub fn keywords(query: &str) -> Vec<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(&t.as_str()))
        .collect();

    let mut keywords: Vec<String> = tokens.windows(2).map(|pair| pair.join(" ")).collect();
    keywords.extend(tokens);

    let mut seen = std::collections::HashSet::new();
    keywords.retain(|k| seen.insert(k.clone()));
    keywords.sort_by(|a, b| b.len().cmp(&a.len()));
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

impl RelevanceScorer for KeywordScorer {
    fn score(&self, query: &str, text: &str) -> f64 {
        let keywords = keywords(query);
        let words = text.split_whitespace().count();
        if keywords.is_empty() || words == 0 {
            return 0.0;
        }

        let haystack = text.to_lowercase();
        let mut hits = 0usize;
        let mut present = 0usize;
        for keyword in &keywords {
            let count = haystack.matches(keyword.as_str()).count();
            hits += count;
            if count > 0 {
                present += 1;
            }
        }

        let k = keywords.len() as f64;
        let density = hits as f64 / (words as f64 * k);
        let coverage = present as f64 / k;
        (DENSITY_WEIGHT * density + COVERAGE_WEIGHT * coverage).clamp(0.0, 1.0)
    }
}
