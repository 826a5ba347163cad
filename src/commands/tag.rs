//! Tag command implementation

use super::rules::resolve_rule_set;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagStats {
    pub collection: String,
    pub rule_set: String,
    pub clients: usize,
    pub sessions: usize,
    pub requests_tagged: usize,
    pub outliers: usize,
    pub by_tag: BTreeMap<String, usize>,
}

/// Re-tag every request of a collection and swap the result in atomically
pub async fn cmd_tag(db: &MetaDb, collection: &str, rules: Option<&str>) -> Result<TagStats> {
    let collection = db.require_collection(collection).await?;
    let (rule_set_name, rule_set) = resolve_rule_set(db, rules).await?;

    let mut clients = db.load_clients(&collection.id).await?;
    if clients.is_empty() {
        return Err(Error::NoData(format!(
            "collection '{}' has no requests to tag",
            collection.name
        )));
    }

    info!(
        collection = %collection.name,
        rules = %rule_set_name,
        "Tagging {} client(s)",
        clients.len()
    );

    let summary = rule_set.tag_clients(&mut clients);
    let vocabulary = rule_set.trace_vocabulary();
    let outcome = db
        .replace_clients(
            &collection.id,
            &clients,
            Some((rule_set_name.as_str(), vocabulary.as_slice())),
        )
        .await?;

    Ok(TagStats {
        collection: collection.name,
        rule_set: rule_set_name,
        clients: outcome.clients,
        sessions: outcome.sessions,
        requests_tagged: summary.requests_tagged,
        outliers: summary.outliers,
        by_tag: summary.by_tag,
    })
}

pub fn print_tag_stats(stats: &TagStats) {
    println!(
        "\n✓ Tagged '{}' with rule set '{}'",
        stats.collection, stats.rule_set
    );
    println!("  Clients: {}", stats.clients);
    println!("  Sessions: {}", stats.sessions);
    println!("  Requests tagged: {}", stats.requests_tagged);
    println!("  Outliers: {}", stats.outliers);
    for (tag, count) in &stats.by_tag {
        println!("    {:<28} {}", tag, count);
    }
}
