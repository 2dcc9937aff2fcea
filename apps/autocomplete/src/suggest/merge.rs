//! Result merging: structured first, generated second, first occurrence wins.
//!
//! Deduplication compares full strings case-insensitively. There is no
//! re-ranking once tiers are concatenated.

use std::collections::HashSet;

/// Deduplicates case-insensitively, preserving first-seen order and casing,
/// and truncates to `cap`. Blank entries are dropped.
pub fn dedup_case_insensitive<I, S>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if out.len() >= cap {
            break;
        }
        let item: String = item.into();
        if item.trim().is_empty() {
            continue;
        }
        if seen.insert(item.to_lowercase()) {
            out.push(item);
        }
    }
    out
}

/// Outcome of merging structured and generated tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub suggestions: Vec<String>,
    /// Entries contributed by the generated tier that were not already present.
    pub added: usize,
}

pub fn merge_tiers(structured: &[String], generated: &[String], cap: usize) -> Merged {
    let base = dedup_case_insensitive(structured.iter().cloned(), cap);
    let base_len = base.len();
    let suggestions = dedup_case_insensitive(base.into_iter().chain(generated.iter().cloned()), cap);
    Merged {
        added: suggestions.len() - base_len,
        suggestions,
    }
}
