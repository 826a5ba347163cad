//! Frequent subsequence mining
//!
//! A subsequence may skip elements: `[A, C]` occurs in `[A, B, C]`. Support
//! is the number of traces containing the pattern at least once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Mining thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FssParams {
    /// Fraction of traces, in (0, 1]
    pub min_support: f64,
    pub min_length: usize,
    pub max_length: usize,
}

impl FssParams {
    /// Support threshold as a trace count, never below one
    pub fn min_count(&self, sequences: usize) -> usize {
        ((self.min_support * sequences as f64).ceil() as usize).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequentSubsequence {
    pub items: Vec<String>,
    pub support: usize,
}

/// Seam for swapping the mining algorithm
pub trait SubsequenceMiner {
    fn mine(&self, sequences: &[Vec<String>], params: &FssParams) -> Vec<FrequentSubsequence>;
}

/// Depth-first pattern growth over projected suffixes
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSpan;

impl SubsequenceMiner for PrefixSpan {
    fn mine(&self, sequences: &[Vec<String>], params: &FssParams) -> Vec<FrequentSubsequence> {
        if sequences.is_empty() || params.max_length == 0 {
            return Vec::new();
        }

        let min_count = params.min_count(sequences.len());
        let projected: Vec<(usize, usize)> = (0..sequences.len()).map(|i| (i, 0)).collect();
        let mut prefix = Vec::new();
        let mut found = Vec::new();

        grow(sequences, &projected, &mut prefix, min_count, params, &mut found);

        // Most supported first, then shorter, then lexicographic
        found.sort_by(|a, b| {
            b.support
                .cmp(&a.support)
                .then(a.items.len().cmp(&b.items.len()))
                .then(a.items.cmp(&b.items))
        });

        debug!(
            patterns = found.len(),
            min_count, "Mined frequent subsequences"
        );
        found
    }
}

fn grow(
    sequences: &[Vec<String>],
    projected: &[(usize, usize)],
    prefix: &mut Vec<String>,
    min_count: usize,
    params: &FssParams,
    found: &mut Vec<FrequentSubsequence>,
) {
    if prefix.len() >= params.max_length {
        return;
    }

    // Count each item once per projected sequence
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &(seq, start) in projected {
        let mut seen: Vec<&str> = Vec::new();
        for item in &sequences[seq][start..] {
            if !seen.contains(&item.as_str()) {
                seen.push(item.as_str());
                *counts.entry(item.as_str()).or_insert(0) += 1;
            }
        }
    }

    for (item, support) in counts {
        if support < min_count {
            continue;
        }

        let next: Vec<(usize, usize)> = projected
            .iter()
            .filter_map(|&(seq, start)| {
                sequences[seq][start..]
                    .iter()
                    .position(|x| x == item)
                    .map(|offset| (seq, start + offset + 1))
            })
            .collect();

        prefix.push(item.to_string());
        if prefix.len() >= params.min_length {
            found.push(FrequentSubsequence {
                items: prefix.clone(),
                support,
            });
        }
        grow(sequences, &next, prefix, min_count, params, found);
        prefix.pop();
    }
}

/// Whether `pattern` occurs in `sequence`, gaps allowed
pub fn contains_subsequence(sequence: &[String], pattern: &[String]) -> bool {
    let mut remaining = pattern.iter().peekable();
    for item in sequence {
        if remaining.peek() == Some(&item) {
            remaining.next();
        }
    }
    remaining.peek().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(raw: &[&str]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|s| s.split(',').map(str::to_string).collect())
            .collect()
    }

    fn items(raw: &str) -> Vec<String> {
        raw.split(',').map(str::to_string).collect()
    }

    #[test]
    fn test_contains_subsequence_allows_gaps() {
        let s = items("A,B,C,D");
        assert!(contains_subsequence(&s, &items("A,C")));
        assert!(contains_subsequence(&s, &items("B,D")));
        assert!(!contains_subsequence(&s, &items("C,A")));
        assert!(contains_subsequence(&s, &[]));
    }

    #[test]
    fn test_prefixspan_finds_gapped_patterns() {
        let sequences = seqs(&["A,B,C", "A,C", "A,X,C", "B,B"]);
        let params = FssParams {
            min_support: 0.75,
            min_length: 2,
            max_length: 3,
        };
        let found = PrefixSpan.mine(&sequences, &params);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].items, items("A,C"));
        assert_eq!(found[0].support, 3);
    }

    #[test]
    fn test_support_counts_sequences_not_occurrences() {
        let sequences = seqs(&["A,A,A,B", "C"]);
        let params = FssParams {
            min_support: 1.0,
            min_length: 1,
            max_length: 2,
        };
        assert!(PrefixSpan.mine(&sequences, &params).is_empty());

        let params = FssParams {
            min_support: 0.5,
            ..params
        };
        let found = PrefixSpan.mine(&sequences, &params);
        let a = found.iter().find(|f| f.items == items("A")).unwrap();
        assert_eq!(a.support, 1);
        assert!(found.iter().any(|f| f.items == items("A,A")));
        assert!(found.iter().all(|f| f.items.len() <= 2));
    }

    #[test]
    fn test_min_count_rounds_up() {
        let params = FssParams {
            min_support: 0.1,
            min_length: 1,
            max_length: 1,
        };
        assert_eq!(params.min_count(5), 1);
        assert_eq!(params.min_count(11), 2);
    }
}
