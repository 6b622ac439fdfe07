//! Deduplication and ranking of extracted documents.

use std::cmp::Ordering;
use std::collections::HashSet;

use sift_core::Document;

/// Scores closer than this are considered tied.
pub const SCORE_EPSILON: f64 = 1e-3;

fn score_bucket(score: f64) -> i64 {
    (score / SCORE_EPSILON).round() as i64
}

/// Ranking order: score bucket descending, then newer publication first
/// (unknown dates last), then lower priority first.
fn compare(a: &Document, b: &Document) -> Ordering {
    score_bucket(b.relevance_score)
        .cmp(&score_bucket(a.relevance_score))
        .then_with(|| match (a.published_at, b.published_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.priority.cmp(&b.priority))
}

/// Merge per-source document lists into one ranked, deduplicated list.
///
/// Within each fingerprint the document with the lowest `priority` is
/// kept. Survivors are ordered by [`compare`] and capped at `max_results`.
pub fn merge(batches: Vec<Vec<Document>>, max_results: usize) -> Vec<Document> {
    let mut documents: Vec<Document> = batches.into_iter().flatten().collect();
    documents.sort_by_key(|doc| doc.priority);

    let mut seen = HashSet::new();
    documents.retain(|doc| seen.insert(doc.content_hash.clone()));

    documents.sort_by(compare);
    documents.truncate(max_results);
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use sift_core::ProviderId;

    fn doc(url: &str, hash: &str, score: f64, priority: usize, published: Option<DateTime<Utc>>) -> Document {
        Document {
            source_url: url.into(),
            provider_id: ProviderId::new("brave"),
            title: None,
            raw_text: "text".into(),
            extracted_at: Utc::now(),
            published_at: published,
            relevance_score: score,
            content_hash: hash.into(),
            priority,
        }
    }

    fn day(d: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).single()
    }

    fn urls(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.source_url.as_str()).collect()
    }

    #[test]
    fn test_duplicate_keeps_higher_priority() {
        let low = doc("https://b.example/copy", "same", 0.9, 5, None);
        let high = doc("https://a.example/orig", "same", 0.2, 1, None);
        let merged = merge(vec![vec![low], vec![high]], 10);
        assert_eq!(urls(&merged), vec!["https://a.example/orig"]);
    }

    #[test]
    fn test_duplicate_across_providers_keeps_higher_priority_provider() {
        let from_b = Document { provider_id: ProviderId::new("b"), ..doc("https://b.example/s", "h", 0.9, 4, day(9)) };
        let from_a = Document { provider_id: ProviderId::new("a"), ..doc("https://a.example/s", "h", 0.3, 2, None) };
        let other = Document { provider_id: ProviderId::new("b"), ..doc("https://b.example/t", "k", 0.1, 5, None) };

        let merged = merge(vec![vec![from_b, other], vec![from_a]], 10);

        assert_eq!(merged.len(), 2);
        let kept = merged.iter().find(|d| d.content_hash == "h").unwrap();
        assert_eq!(kept.provider_id.as_str(), "a");
        assert_eq!(kept.priority, 2);
        assert_eq!(kept.source_url, "https://a.example/s");
    }

    #[test]
    fn test_orders_by_score() {
        let merged = merge(
            vec![vec![doc("https://a", "1", 0.2, 0, None), doc("https://b", "2", 0.8, 1, None)]],
            10,
        );
        assert_eq!(urls(&merged), vec!["https://b", "https://a"]);
    }

    #[test]
    fn test_near_tie_broken_by_recency_then_priority() {
        let merged = merge(
            vec![vec![
                doc("https://undated", "1", 0.5002, 0, None),
                doc("https://old", "2", 0.5, 1, day(1)),
                doc("https://new", "3", 0.4999, 2, day(20)),
                doc("https://new-later", "4", 0.5, 3, day(20)),
            ]],
            10,
        );
        assert_eq!(urls(&merged), vec!["https://new", "https://new-later", "https://old", "https://undated"]);
    }

    #[test]
    fn test_caps_results() {
        let batch = (0..5).map(|i| doc(&format!("https://{i}"), &i.to_string(), 0.1 * i as f64, i, None)).collect();
        let merged = merge(vec![batch], 2);
        assert_eq!(urls(&merged), vec!["https://4", "https://3"]);
        assert!(merge(Vec::new(), 3).is_empty());
    }
}
