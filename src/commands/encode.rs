//! Encoding commands: feature vectors and distance matrices for clustering

use super::stats::collection_traces;
use crate::config::EncodingConfig;
use crate::encode::{
    distance_matrix, edit_distance_matrix, Encoder, FssParams, Metric, PrefixSpan,
    Representation, Vocabulary,
};
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::trace::{read_traces, Trace};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Where traces come from, and the vocabulary that goes with them
#[derive(Debug, Clone)]
pub struct EncodingInput {
    pub traces: Vec<Trace>,
    /// Fixed vocabulary; derived from the traces when absent
    pub vocabulary: Option<Vocabulary>,
}

impl EncodingInput {
    /// Traces of a tagged collection; dimensions are the trace tags recorded
    /// when it was tagged, so later rule uploads do not shift them
    pub async fn from_collection(db: &MetaDb, collection: &str) -> Result<Self> {
        let stored = db.require_collection(collection).await?;
        let traces = collection_traces(db, collection, None).await?;
        let vocabulary = match stored.tag_vocabulary()? {
            Some(tags) => Vocabulary::new(tags)?,
            None => Vocabulary::from_traces(&traces)?,
        };
        Ok(Self {
            traces,
            vocabulary: Some(vocabulary),
        })
    }

    /// Traces read from a file of `client_id;tag,...` lines
    pub async fn from_file(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let traces = read_traces(&text)?;
        if traces.is_empty() {
            return Err(Error::NoData(format!("no traces in {}", path.display())));
        }
        Ok(Self {
            traces,
            vocabulary: None,
        })
    }
}

/// One encoded trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedTrace {
    pub client_id: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorReport {
    pub representation: Representation,
    /// One label per dimension
    pub labels: Vec<String>,
    pub vectors: Vec<EncodedTrace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceReport {
    /// `levenshtein` or `<representation>/<metric>`
    pub measure: String,
    /// Client id of each row
    pub rows: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

fn build_encoder(
    input: &EncodingInput,
    representation: Representation,
    config: &EncodingConfig,
) -> Result<Encoder> {
    match representation {
        Representation::Fss => {
            let params = FssParams {
                min_support: config.min_support,
                min_length: config.min_length,
                max_length: config.max_length,
            };
            Encoder::mine_fss(&input.traces, &params, &PrefixSpan)
        }
        kind => {
            let vocabulary = match &input.vocabulary {
                Some(v) => v.clone(),
                None => Vocabulary::from_traces(&input.traces)?,
            };
            Encoder::over_tags(kind, vocabulary)
        }
    }
}

pub fn cmd_encode_vectors(
    input: &EncodingInput,
    representation: Representation,
    config: &EncodingConfig,
) -> Result<VectorReport> {
    let encoder = build_encoder(input, representation, config)?;
    let vectors = encoder.encode_all(&input.traces)?;
    info!(
        traces = vectors.len(),
        dimension = encoder.labels().len(),
        "Encoded traces as {}",
        representation
    );

    Ok(VectorReport {
        representation,
        labels: encoder.labels(),
        vectors: input
            .traces
            .iter()
            .zip(vectors)
            .map(|(t, v)| EncodedTrace {
                client_id: t.client_id.clone(),
                values: v.values,
            })
            .collect(),
    })
}

pub fn cmd_distances(
    input: &EncodingInput,
    representation: Representation,
    metric: Metric,
    config: &EncodingConfig,
) -> Result<DistanceReport> {
    if !metric.supports(representation) {
        return Err(Error::UnsupportedMetric {
            metric: metric.to_string(),
            representation: representation.to_string(),
        });
    }

    let encoder = build_encoder(input, representation, config)?;
    let vectors = encoder.encode_all(&input.traces)?;
    let matrix = distance_matrix(&vectors, metric)?;
    debug!(rows = matrix.len(), "Computed distance matrix");

    Ok(DistanceReport {
        measure: format!("{}/{}", representation, metric),
        rows: input.traces.iter().map(|t| t.client_id.clone()).collect(),
        matrix,
    })
}

pub fn cmd_edit_distances(input: &EncodingInput) -> DistanceReport {
    DistanceReport {
        measure: "levenshtein".to_string(),
        rows: input.traces.iter().map(|t| t.client_id.clone()).collect(),
        matrix: edit_distance_matrix(&input.traces),
    }
}

pub fn print_vector_report(report: &VectorReport) {
    println!("client_id;{}", report.labels.join(";"));
    for vector in &report.vectors {
        let values: Vec<String> = vector.values.iter().map(|v| format_value(*v)).collect();
        println!("{};{}", vector.client_id, values.join(";"));
    }
}

pub fn print_distance_report(report: &DistanceReport) {
    println!("# {}", report.measure);
    for (client, row) in report.rows.iter().zip(&report.matrix) {
        let values: Vec<String> = row.iter().map(|v| format_value(*v)).collect();
        println!("{};{}", client, values.join(";"));
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.4}", v)
    }
}
