//! Tag rule set commands

use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::tagging::{RuleSet, TagRule};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Name under which the built-in cascade is addressed
pub const BUILTIN_RULE_SET: &str = "builtin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetInfo {
    pub name: String,
    pub rule_count: usize,
    pub vocabulary: Vec<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDetails {
    #[serde(flatten)]
    pub info: RuleSetInfo,
    pub rules: Vec<TagRule>,
}

fn info_for(name: &str, rules: &RuleSet, updated_at: Option<String>) -> RuleSetInfo {
    RuleSetInfo {
        name: name.to_string(),
        rule_count: rules.rules().len(),
        vocabulary: rules.vocabulary().to_vec(),
        updated_at,
    }
}

/// Resolve a rule set by name; `None` and `builtin` give the built-in cascade
pub async fn resolve_rule_set(db: &MetaDb, name: Option<&str>) -> Result<(String, RuleSet)> {
    match name {
        None | Some(BUILTIN_RULE_SET) => Ok((BUILTIN_RULE_SET.to_string(), RuleSet::builtin())),
        Some(name) => {
            let stored = db
                .load_rule_set(name)
                .await?
                .ok_or_else(|| Error::RuleSetNotFound(name.to_string()))?;
            Ok((name.to_string(), RuleSet::from_json(&stored.rules_json)?))
        }
    }
}

/// Validate a JSON rule file and store it under `name`
pub async fn cmd_upload_rules(db: &MetaDb, name: &str, path: &Path) -> Result<RuleSetInfo> {
    if name.trim().is_empty() || name == BUILTIN_RULE_SET {
        return Err(Error::Config(format!(
            "'{}' cannot be used as a rule set name",
            name
        )));
    }

    let json = tokio::fs::read_to_string(path).await?;
    let rules = RuleSet::from_json(&json)?;
    db.save_rule_set(name, &rules.to_json_pretty()?).await?;

    info!(rules = rules.rules().len(), "Stored rule set '{}'", name);
    Ok(info_for(name, &rules, None))
}

pub async fn cmd_show_rules(db: &MetaDb, name: &str) -> Result<RuleSetDetails> {
    let updated_at = match name {
        BUILTIN_RULE_SET => None,
        _ => db.load_rule_set(name).await?.map(|s| s.updated_at),
    };
    let (name, rules) = resolve_rule_set(db, Some(name)).await?;
    Ok(RuleSetDetails {
        info: info_for(&name, &rules, updated_at),
        rules: rules.rules().to_vec(),
    })
}

/// The built-in cascade followed by stored rule sets
pub async fn cmd_list_rules(db: &MetaDb) -> Result<Vec<RuleSetInfo>> {
    let mut result = vec![info_for(BUILTIN_RULE_SET, &RuleSet::builtin(), None)];
    for stored in db.list_rule_sets().await? {
        let rules = RuleSet::from_json(&stored.rules_json)?;
        result.push(info_for(&stored.name, &rules, Some(stored.updated_at)));
    }
    Ok(result)
}

pub fn print_rule_sets(rule_sets: &[RuleSetInfo]) {
    println!("\n🏷  Rule sets\n");
    for info in rule_sets {
        println!("• {} ({} rules)", info.name, info.rule_count);
        println!("  Tags: {}", info.vocabulary.join(", "));
        if let Some(updated) = &info.updated_at {
            println!("  Updated: {}", updated);
        }
    }
}

pub fn print_rule_set_details(details: &RuleSetDetails) {
    print_rule_sets(std::slice::from_ref(&details.info));
    println!();
    for (i, rule) in details.rules.iter().enumerate() {
        let label = rule.name.clone().unwrap_or_else(|| format!("#{}", i + 1));
        let mut conditions = Vec::new();
        if !rule.all_of.is_empty() {
            conditions.push(format!("all of [{}]", rule.all_of.join(", ")));
        }
        if !rule.any_of.is_empty() {
            conditions.push(format!("any of [{}]", rule.any_of.join(", ")));
        }
        let outcome = match &rule.tag {
            Some(tag) => tag.clone(),
            None => {
                let anchors: Vec<String> = rule
                    .earliest
                    .iter()
                    .map(|a| format!("{}→{}", a.keyword, a.tag))
                    .collect();
                format!("earliest of [{}]", anchors.join(", "))
            }
        };
        println!("  {:>3}. {}: {} ⇒ {}", i + 1, label, conditions.join(" and "), outcome);
    }
}
