//! Similarity scoring and hybrid ranking over knowledge entries.
//!
//! - Term-overlap keyword scoring
//! - Cosine similarity over stored embeddings
//! - Reciprocal Rank Fusion (RRF) for merging ranked lists

use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeQuery, SearchMode};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Standard RRF damping constant.
pub const RRF_K: u32 = 60;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "with", "this", "that", "have",
    "has", "was", "were", "from", "they", "them", "what", "when", "about", "been", "can",
    "into", "its", "just", "like", "than", "then", "there", "very", "will", "would",
];

/// Lowercased content terms of at least three characters, stopwords removed.
pub fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn by_score_desc(a: &KnowledgeEntry, b: &KnowledgeEntry) -> Ordering {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
}

/// Rank entries by the fraction of query terms they contain.
///
/// Entries sharing no term with the query are dropped.
pub fn keyword_search(
    entries: &[KnowledgeEntry],
    query: &str,
    limit: usize,
    min_score: f32,
) -> Vec<KnowledgeEntry> {
    let query_terms = terms(query);
    if query_terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<KnowledgeEntry> = entries
        .iter()
        .filter_map(|entry| {
            let entry_terms = terms(&entry.content);
            let hits = query_terms.intersection(&entry_terms).count();
            if hits == 0 {
                return None;
            }
            let score = hits as f32 / query_terms.len() as f32;
            (score >= min_score).then(|| {
                let mut e = entry.clone();
                e.score = score;
                e
            })
        })
        .collect();

    scored.sort_by(by_score_desc);
    scored.truncate(limit);
    scored
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths, empty input, or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (*x as f64, *y as f64);
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank entries that carry an embedding by cosine similarity to `query_embedding`.
pub fn vector_search(
    entries: &[KnowledgeEntry],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<KnowledgeEntry> {
    let mut scored: Vec<KnowledgeEntry> = entries
        .iter()
        .filter_map(|entry| {
            let sim = cosine_similarity(entry.embedding.as_deref()?, query_embedding);
            (sim >= min_score).then(|| {
                let mut e = entry.clone();
                e.score = sim;
                e
            })
        })
        .collect();

    scored.sort_by(by_score_desc);
    scored.truncate(limit);
    scored
}

/// Merge ranked lists with Reciprocal Rank Fusion.
///
/// Each entry scores `sum(1 / (k + rank))` over the lists it appears in.
/// Results are deduplicated by entry ID.
pub fn reciprocal_rank_fusion(
    lists: &[&[KnowledgeEntry]],
    k: u32,
    limit: usize,
) -> Vec<KnowledgeEntry> {
    let k = k as f32;
    let mut fused: HashMap<&str, (f32, &KnowledgeEntry)> = HashMap::new();

    for list in lists {
        for (rank, entry) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f32 + 1.0);
            fused
                .entry(entry.id.as_str())
                .and_modify(|(score, _)| *score += contribution)
                .or_insert((contribution, entry));
        }
    }

    let mut results: Vec<KnowledgeEntry> = fused
        .into_values()
        .map(|(score, entry)| {
            let mut e = entry.clone();
            e.score = score;
            e
        })
        .collect();

    results.sort_by(by_score_desc);
    results.truncate(limit);
    results
}

/// Run a [`KnowledgeQuery`] over a slice of entries.
///
/// Vector and hybrid modes fall back to keyword scoring when the query has
/// no embedding.
pub fn run_query(entries: &[KnowledgeEntry], query: &KnowledgeQuery) -> Vec<KnowledgeEntry> {
    let keyword = || keyword_search(entries, &query.text, query.limit, query.min_score);

    match (query.mode, query.embedding.as_deref()) {
        (SearchMode::Keyword, _) | (_, None) => keyword(),
        (SearchMode::Vector, Some(emb)) => vector_search(entries, emb, query.limit, query.min_score),
        (SearchMode::Hybrid, Some(emb)) => {
            let candidates = query.limit.saturating_mul(2).max(query.limit);
            let kw = keyword_search(entries, &query.text, candidates, query.min_score);
            let vec = vector_search(entries, emb, candidates, query.min_score);
            if vec.is_empty() {
                let mut kw = kw;
                kw.truncate(query.limit);
                return kw;
            }
            reciprocal_rank_fusion(&[&kw, &vec], RRF_K, query.limit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbtsim_core::knowledge::KnowledgeKind;

    fn entry(id: &str, content: &str, embedding: Option<Vec<f32>>) -> KnowledgeEntry {
        let mut e = KnowledgeEntry::new(content, KnowledgeKind::Reference);
        e.id = id.into();
        e.embedding = embedding;
        e
    }

    #[test]
    fn terms_drop_short_words_and_stopwords() {
        let t = terms("I can't sleep and the work is stressful");
        assert!(t.contains("sleep"));
        assert!(t.contains("stressful"));
        assert!(t.contains("can't"));
        assert!(!t.contains("the"));
        assert!(!t.contains("is"));
    }

    #[test]
    fn keyword_ranks_by_term_overlap() {
        let entries = vec![
            entry("a", "Exposure therapy for anxiety", None),
            entry("b", "Anxiety about work and poor sleep", None),
            entry("c", "Gardening tips", None),
        ];
        let results = keyword_search(&entries, "anxious about work, can't sleep, anxiety", 10, 0.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "b");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn keyword_empty_query_returns_nothing() {
        let entries = vec![entry("a", "anything", None)];
        assert!(keyword_search(&entries, "a an is", 10, 0.0).is_empty());
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-5);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-5);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn vector_search_skips_entries_without_embeddings() {
        let entries = vec![
            entry("a", "x", Some(vec![1.0, 0.0])),
            entry("b", "y", None),
            entry("c", "z", Some(vec![0.7, 0.7])),
        ];
        let results = vector_search(&entries, &[1.0, 0.0], 10, 0.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn rrf_boosts_entries_in_both_lists() {
        let a = entry("a", "", None);
        let b = entry("b", "", None);
        let c = entry("c", "", None);
        let kw = vec![a.clone(), b.clone()];
        let vec = vec![b.clone(), c.clone()];
        let fused = reciprocal_rank_fusion(&[&kw, &vec], RRF_K, 10);
        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].id, "b");
    }

    #[test]
    fn hybrid_without_embedding_is_keyword() {
        let entries = vec![entry("a", "sleep problems", Some(vec![1.0]))];
        let q = KnowledgeQuery {
            text: "sleep".into(),
            limit: 4,
            min_score: 0.0,
            embedding: None,
            mode: SearchMode::Hybrid,
        };
        let results = run_query(&entries, &q);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hybrid_with_embedding_fuses() {
        let entries = vec![
            entry("a", "sleep problems", Some(vec![0.0, 1.0])),
            entry("b", "unrelated text", Some(vec![1.0, 0.0])),
        ];
        let q = KnowledgeQuery {
            text: "sleep".into(),
            limit: 2,
            min_score: 0.0,
            embedding: Some(vec![0.0, 1.0]),
            mode: SearchMode::Hybrid,
        };
        let results = run_query(&entries, &q);
        assert_eq!(results[0].id, "a");
        assert!(results.len() <= 2);
    }
}
