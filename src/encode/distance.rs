//! Pairwise distances between feature vectors and between traces

use super::{FeatureVector, Representation};
use crate::error::{Error, Result};
use crate::trace::Trace;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Vector distance metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Jaccard,
    Hamming,
    Cosine,
    Euclidean,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Jaccard => write!(f, "jaccard"),
            Metric::Hamming => write!(f, "hamming"),
            Metric::Cosine => write!(f, "cosine"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jaccard" => Ok(Metric::Jaccard),
            "hamming" => Ok(Metric::Hamming),
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            _ => Err(Error::Config(format!("Unknown metric: {}", s))),
        }
    }
}

impl Metric {
    /// Euclidean distance is only meaningful on FSS indicator vectors
    pub fn supports(&self, kind: Representation) -> bool {
        !matches!(self, Metric::Euclidean) || kind == Representation::Fss
    }
}

/// Distance between two vectors of the same kind and dimension
pub fn distance(a: &FeatureVector, b: &FeatureVector, metric: Metric) -> Result<f64> {
    if a.kind != b.kind || a.dimension() != b.dimension() {
        return Err(Error::DimensionMismatch {
            left: format!("{}[{}]", a.kind, a.dimension()),
            right: format!("{}[{}]", b.kind, b.dimension()),
        });
    }
    if !metric.supports(a.kind) {
        return Err(Error::UnsupportedMetric {
            metric: metric.to_string(),
            representation: a.kind.to_string(),
        });
    }

    Ok(match metric {
        Metric::Jaccard => jaccard(&a.values, &b.values),
        Metric::Hamming => hamming(&a.values, &b.values),
        Metric::Cosine => cosine(&a.values, &b.values),
        Metric::Euclidean => euclidean(&a.values, &b.values),
    })
}

/// `1 - |A ∩ B| / |A ∪ B|` over the sets of non-zero positions; two empty sets are identical
pub fn jaccard(a: &[f64], b: &[f64]) -> f64 {
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        let (in_a, in_b) = (*x != 0.0, *y != 0.0);
        if in_a && in_b {
            intersection += 1;
        }
        if in_a || in_b {
            union += 1;
        }
    }
    if union == 0 {
        return 0.0;
    }
    1.0 - intersection as f64 / union as f64
}

/// Fraction of positions that differ
pub fn hamming(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let differing = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
    differing as f64 / a.len() as f64
}

/// `1 - cos(θ)`. Two zero vectors are at distance 0, a zero and a non-zero vector at 1.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let zero_a = norm_a < f64::EPSILON;
    let zero_b = norm_b < f64::EPSILON;
    match (zero_a, zero_b) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        _ => (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0),
    }
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Edit distance between tag sequences, unit costs
pub fn levenshtein(a: &[String], b: &[String]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, x) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(x != y);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Symmetric matrix of pairwise vector distances, zero diagonal
pub fn distance_matrix(vectors: &[FeatureVector], metric: Metric) -> Result<Vec<Vec<f64>>> {
    let n = vectors.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distance(&vectors[i], &vectors[j], metric)?;
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    Ok(matrix)
}

/// Symmetric matrix of Levenshtein distances between traces
pub fn edit_distance_matrix(traces: &[Trace]) -> Vec<Vec<f64>> {
    let n = traces.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = levenshtein(&traces[i].tags, &traces[j].tags) as f64;
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    matrix
}
