//! In-memory fuzzy index over contact registry entries.
//!
//! A query matches a field when some substring of the field is within a
//! bounded edit distance of the query. The score of a field is that distance
//! divided by the query length, so `0.0` means the query occurs verbatim and
//! `1.0` means nothing lines up. An entry scores the minimum over its indexed
//! fields and is admitted when its score is at most the threshold.

use crate::{MatchSet, RegistryEntry, ScoredEntry};

/// Admits moderate typos and partial names.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Fields searched by [`FuzzyIndex::for_registry`].
pub const REGISTRY_KEYS: [&str; 2] = [RegistryEntry::COMPANY, RegistryEntry::PERSON];

struct IndexedEntry {
    entry: RegistryEntry,
    keys: Vec<Vec<char>>,
}

/// A search structure built once per lookup run and dropped with it.
pub struct FuzzyIndex {
    entries: Vec<IndexedEntry>,
    threshold: f64,
}

impl FuzzyIndex {
    /// Indexes `entries` over the given field names. `threshold` is clamped
    /// to `[0.0, 1.0]`.
    pub fn build(entries: Vec<RegistryEntry>, keys: &[&str], threshold: f64) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_THRESHOLD
        };
        let entries = entries
            .into_iter()
            .map(|entry| {
                let keys = keys
                    .iter()
                    .filter_map(|k| entry.field(k))
                    .map(normalise)
                    .collect();
                IndexedEntry { entry, keys }
            })
            .collect();
        Self { entries, threshold }
    }

    /// Indexes the organisation and contact-name columns.
    pub fn for_registry(entries: Vec<RegistryEntry>, threshold: f64) -> Self {
        Self::build(entries, &REGISTRY_KEYS, threshold)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every admitted entry, best score first. Ties keep registry
    /// order. A blank query matches nothing.
    pub fn search(&self, query: &str) -> MatchSet {
        let pattern = normalise(query);
        if pattern.is_empty() {
            return MatchSet::new(query.trim(), Vec::new());
        }

        let mut matches: Vec<ScoredEntry> = self
            .entries
            .iter()
            .filter_map(|indexed| {
                let score = indexed
                    .keys
                    .iter()
                    .map(|key| score(&pattern, key))
                    .fold(f64::INFINITY, f64::min);
                (score <= self.threshold).then(|| ScoredEntry {
                    entry: indexed.entry.clone(),
                    score,
                })
            })
            .collect();
        matches.sort_by(|a, b| a.score.total_cmp(&b.score));
        MatchSet::new(query.trim(), matches)
    }
}

fn normalise(value: &str) -> Vec<char> {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .collect()
}

/// Normalised best-substring edit distance of `pattern` within `text`.
fn score(pattern: &[char], text: &[char]) -> f64 {
    if pattern.is_empty() {
        return 0.0;
    }
    substring_distance(pattern, text) as f64 / pattern.len() as f64
}

/// Minimum edit distance between `pattern` and any substring of `text`.
///
/// Standard DP with a free start position in `text` (row 0 is all zeros)
/// and a free end position (minimum over the last row).
fn substring_distance(pattern: &[char], text: &[char]) -> usize {
    let mut prev = vec![0usize; text.len() + 1];
    let mut cur = vec![0usize; text.len() + 1];
    for (i, p) in pattern.iter().enumerate() {
        cur[0] = i + 1;
        for (j, t) in text.iter().enumerate() {
            let substitute = prev[j] + usize::from(p != t);
            cur[j + 1] = substitute.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev.into_iter().min().unwrap_or(pattern.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<RegistryEntry> {
        vec![
            RegistryEntry::from_fields([("Company", "Northwind Publishing"), ("Person", "Rune Dittmer")]),
            RegistryEntry::from_fields([("Company", "Acme Games"), ("Person", "Jo Park")]),
            RegistryEntry::from_fields([("Company", "Acme Capital"), ("Person", "Sam Ortiz")]),
        ]
    }

    fn companies(set: &MatchSet) -> Vec<&str> {
        set.entries()
            .filter_map(|e| e.field(RegistryEntry::COMPANY))
            .collect()
    }

    #[test]
    fn test_substring_distance() {
        let c = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(substring_distance(&c("acme"), &c("acme games")), 0);
        assert_eq!(substring_distance(&c("acne"), &c("acme games")), 1);
        assert_eq!(substring_distance(&c("abc"), &c("")), 3);
    }

    #[test]
    fn test_exact_and_typo_matches() {
        let index = FuzzyIndex::for_registry(registry(), DEFAULT_THRESHOLD);
        assert_eq!(companies(&index.search("Rune Dittmer")), vec!["Northwind Publishing"]);
        assert_eq!(companies(&index.search("rune ditmer")), vec!["Northwind Publishing"]);
        assert!(index.search("zzzzzz").is_empty());
    }

    #[test]
    fn test_results_are_ranked_best_first() {
        // "acme gams" is 1 edit from "acme games" and 3 from "acme cap".
        let index = FuzzyIndex::for_registry(registry(), 0.4);
        let set = index.search("Acme Gams");
        assert_eq!(companies(&set), vec!["Acme Games", "Acme Capital"]);
        assert!(set.matches()[0].score < set.matches()[1].score);
    }

    #[test]
    fn test_threshold_bounds() {
        let exact = FuzzyIndex::for_registry(registry(), 0.0);
        assert_eq!(exact.search("Acme").len(), 2);
        assert!(exact.search("Acne").is_empty());

        let anything = FuzzyIndex::for_registry(registry(), 1.0);
        assert_eq!(anything.search("qqqq").len(), 3);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let index = FuzzyIndex::for_registry(registry(), 1.0);
        assert!(index.search("   ").is_empty());
    }
}
