//! Feature vectors for clustering
//!
//! Traces are turned into fixed-dimension vectors, either over the tag
//! vocabulary (binary, frequency, relative frequency) or over mined frequent
//! subsequences (FSS). Distances live in [`distance`].

pub mod distance;
mod fss;

pub use distance::*;
pub use fss::*;

use crate::error::{Error, Result};
use crate::trace::Trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Vector representation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    Binary,
    Frequency,
    RelativeFrequency,
    Fss,
}

impl std::fmt::Display for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Representation::Binary => write!(f, "binary"),
            Representation::Frequency => write!(f, "frequency"),
            Representation::RelativeFrequency => write!(f, "relative_frequency"),
            Representation::Fss => write!(f, "fss"),
        }
    }
}

impl FromStr for Representation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "binary" => Ok(Representation::Binary),
            "frequency" => Ok(Representation::Frequency),
            "relative_frequency" => Ok(Representation::RelativeFrequency),
            "fss" => Ok(Representation::Fss),
            _ => Err(Error::Config(format!("Unknown representation: {}", s))),
        }
    }
}

/// Ordered tag vocabulary; one dimension per tag
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    tags: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Duplicates keep their first position
    pub fn new(tags: Vec<String>) -> Result<Self> {
        let mut vocab = Self {
            tags: Vec::new(),
            index: HashMap::new(),
        };
        for tag in tags {
            if !vocab.index.contains_key(&tag) {
                vocab.index.insert(tag.clone(), vocab.tags.len());
                vocab.tags.push(tag);
            }
        }
        if vocab.tags.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        Ok(vocab)
    }

    /// Vocabulary in first-seen order across traces
    pub fn from_traces(traces: &[Trace]) -> Result<Self> {
        Self::new(traces.iter().flat_map(|t| t.tags.iter().cloned()).collect())
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn position(&self, tag: &str) -> Option<usize> {
        self.index.get(tag).copied()
    }
}

/// An encoded trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub kind: Representation,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn nonzero_indices(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Labels of the non-zero dimensions
    pub fn nonzero_labels<'a>(&self, labels: &'a [String]) -> Vec<&'a str> {
        self.nonzero_indices()
            .into_iter()
            .filter_map(|i| labels.get(i).map(String::as_str))
            .collect()
    }
}

/// A configured encoder; every vector it yields has the same dimension
#[derive(Debug, Clone)]
pub enum Encoder {
    Tags {
        kind: Representation,
        vocabulary: Vocabulary,
    },
    Fss {
        patterns: Vec<FrequentSubsequence>,
    },
}

impl Encoder {
    /// Binary, frequency or relative-frequency encoder over `vocabulary`
    pub fn over_tags(kind: Representation, vocabulary: Vocabulary) -> Result<Self> {
        if kind == Representation::Fss {
            return Err(Error::Config(
                "fss vectors are built from mined subsequences, not a vocabulary".to_string(),
            ));
        }
        Ok(Encoder::Tags { kind, vocabulary })
    }

    /// FSS encoder whose dimensions are the subsequences mined from `traces`
    pub fn mine_fss(
        traces: &[Trace],
        params: &FssParams,
        miner: &dyn SubsequenceMiner,
    ) -> Result<Self> {
        let sequences: Vec<Vec<String>> = traces.iter().map(|t| t.tags.clone()).collect();
        let patterns = miner.mine(&sequences, params);
        if patterns.is_empty() {
            return Err(Error::NoData(format!(
                "no subsequence reaches min_support {} with length >= {}",
                params.min_support, params.min_length
            )));
        }
        Ok(Encoder::Fss { patterns })
    }

    pub fn representation(&self) -> Representation {
        match self {
            Encoder::Tags { kind, .. } => *kind,
            Encoder::Fss { .. } => Representation::Fss,
        }
    }

    /// One label per dimension
    pub fn labels(&self) -> Vec<String> {
        match self {
            Encoder::Tags { vocabulary, .. } => vocabulary.tags().to_vec(),
            Encoder::Fss { patterns } => patterns.iter().map(|p| p.items.join(",")).collect(),
        }
    }

    pub fn encode(&self, trace: &Trace) -> Result<FeatureVector> {
        match self {
            Encoder::Tags { kind, vocabulary } => {
                let mut values = vec![0.0; vocabulary.len()];
                for tag in &trace.tags {
                    let i = vocabulary
                        .position(tag)
                        .ok_or_else(|| Error::UnknownTag(tag.clone()))?;
                    match kind {
                        Representation::Binary => values[i] = 1.0,
                        _ => values[i] += 1.0,
                    }
                }
                if *kind == Representation::RelativeFrequency && !trace.tags.is_empty() {
                    let len = trace.tags.len() as f64;
                    values.iter_mut().for_each(|v| *v /= len);
                }
                Ok(FeatureVector { kind: *kind, values })
            }
            Encoder::Fss { patterns } => Ok(FeatureVector {
                kind: Representation::Fss,
                values: patterns
                    .iter()
                    .map(|p| {
                        if contains_subsequence(&trace.tags, &p.items) {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect(),
            }),
        }
    }

    pub fn encode_all(&self, traces: &[Trace]) -> Result<Vec<FeatureVector>> {
        traces.iter().map(|t| self.encode(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn vocab(tags: &[&str]) -> Vocabulary {
        Vocabulary::new(tags.iter().map(|t| t.to_string()).collect()).unwrap()
    }

    fn trace(line: &str) -> Trace {
        line.parse().unwrap()
    }

    #[test]
    fn test_binary_nonzero_set_is_distinct_tags() {
        let v = vocab(&["A", "B", "C", "D"]);
        let encoder = Encoder::over_tags(Representation::Binary, v).unwrap();
        let t = trace("c1;C,A,C,A");
        let vector = encoder.encode(&t).unwrap();
        assert_eq!(vector.values, vec![1.0, 0.0, 1.0, 0.0]);

        let labels = encoder.labels();
        let decoded: BTreeSet<&str> = vector.nonzero_labels(&labels).into_iter().collect();
        let distinct: BTreeSet<&str> = t.tags.iter().map(String::as_str).collect();
        assert_eq!(decoded, distinct);
    }

    #[test]
    fn test_frequency_and_relative_frequency() {
        let v = vocab(&["A", "B"]);
        let t = trace("c1;A,B,A,A");

        let freq = Encoder::over_tags(Representation::Frequency, v.clone())
            .unwrap()
            .encode(&t)
            .unwrap();
        assert_eq!(freq.values, vec![3.0, 1.0]);

        let rel = Encoder::over_tags(Representation::RelativeFrequency, v)
            .unwrap()
            .encode(&t)
            .unwrap();
        assert_eq!(rel.values, vec![0.75, 0.25]);
        assert!((rel.values.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let encoder = Encoder::over_tags(Representation::Binary, vocab(&["A"])).unwrap();
        assert!(matches!(
            encoder.encode(&trace("c1;A,Z")),
            Err(Error::UnknownTag(tag)) if tag == "Z"
        ));
    }

    #[test]
    fn test_empty_vocabulary() {
        assert!(matches!(Vocabulary::new(Vec::new()), Err(Error::EmptyVocabulary)));
        assert!(matches!(Vocabulary::from_traces(&[]), Err(Error::EmptyVocabulary)));
    }

    #[test]
    fn test_vocabulary_from_traces_keeps_first_seen_order() {
        let v = Vocabulary::from_traces(&[trace("a;B,A"), trace("b;C,B")]).unwrap();
        assert_eq!(v.tags(), &["B", "A", "C"]);
    }

    #[test]
    fn test_fss_encoding() {
        let traces = vec![trace("a;A,B,C"), trace("b;A,C"), trace("c;B,B")];
        let params = FssParams {
            min_support: 0.6,
            min_length: 2,
            max_length: 3,
        };
        let encoder = Encoder::mine_fss(&traces, &params, &PrefixSpan).unwrap();
        assert_eq!(encoder.labels(), vec!["A,C".to_string()]);

        let vectors = encoder.encode_all(&traces).unwrap();
        let values: Vec<f64> = vectors.iter().map(|v| v.values[0]).collect();
        assert_eq!(values, vec![1.0, 1.0, 0.0]);
        assert!(vectors.iter().all(|v| v.kind == Representation::Fss));
    }

    #[test]
    fn test_fss_without_patterns() {
        let traces = vec![trace("a;A"), trace("b;B")];
        let params = FssParams {
            min_support: 1.0,
            min_length: 2,
            max_length: 3,
        };
        assert!(matches!(
            Encoder::mine_fss(&traces, &params, &PrefixSpan),
            Err(Error::NoData(_))
        ));
    }

    #[test]
    fn test_representation_names() {
        assert_eq!(
            "relative-frequency".parse::<Representation>().unwrap(),
            Representation::RelativeFrequency
        );
        assert_eq!(Representation::Fss.to_string(), "fss");
        assert!("tfidf".parse::<Representation>().is_err());
        assert!(Encoder::over_tags(Representation::Fss, vocab(&["A"])).is_err());
    }
}
