//! URL tagging through an ordered rule cascade
//!
//! Each rule is a conjunction of substring checks (`all_of`), an optional
//! disjunction (`any_of`), and an outcome: either a fixed tag or a list of
//! anchors where the keyword found at the lowest offset in the URL decides.
//! The first matching rule wins; a URL no rule matches is `Outliers`.
//! Matching is case-sensitive and never normalises the URL.

mod builtin;

use crate::error::{Error, Result};
use crate::models::{Client, OUTLIERS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Keyword whose position in the URL selects a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub keyword: String,
    pub tag: String,
}

impl Anchor {
    pub fn new(keyword: &str, tag: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            tag: tag.to_string(),
        }
    }
}

/// One entry of the cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Every keyword must occur in the URL
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<String>,

    /// At least one keyword must occur (ignored when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<String>,

    /// Fixed outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Offset tie-break outcome; the earliest keyword wins, first listed on ties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub earliest: Vec<Anchor>,
}

impl TagRule {
    pub fn fixed(name: &str, all_of: &[&str], any_of: &[&str], tag: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            all_of: all_of.iter().map(|s| s.to_string()).collect(),
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
            tag: Some(tag.to_string()),
            earliest: Vec::new(),
        }
    }

    pub fn earliest(name: &str, all_of: &[&str], anchors: &[(&str, &str)]) -> Self {
        Self {
            name: Some(name.to_string()),
            all_of: all_of.iter().map(|s| s.to_string()).collect(),
            any_of: Vec::new(),
            tag: None,
            earliest: anchors.iter().map(|(k, t)| Anchor::new(k, t)).collect(),
        }
    }

    fn label(&self, position: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("rule #{}", position + 1))
    }

    fn validate(&self, position: usize) -> Result<()> {
        let label = self.label(position);

        if self.all_of.is_empty() && self.any_of.is_empty() {
            return Err(Error::InvalidRule(format!("{} has no keywords", label)));
        }
        if self
            .all_of
            .iter()
            .chain(self.any_of.iter())
            .any(|k| k.is_empty())
        {
            return Err(Error::InvalidRule(format!("{} has an empty keyword", label)));
        }

        if self
            .outcome_tags()
            .any(|t| t.contains(',') || t.contains(';'))
        {
            return Err(Error::InvalidRule(format!(
                "{} produces a tag containing ',' or ';'",
                label
            )));
        }

        match (&self.tag, self.earliest.is_empty()) {
            (Some(tag), true) if !tag.is_empty() => Ok(()),
            (None, false) => {
                if self
                    .earliest
                    .iter()
                    .any(|a| a.keyword.is_empty() || a.tag.is_empty())
                {
                    return Err(Error::InvalidRule(format!(
                        "{} has an anchor with an empty keyword or tag",
                        label
                    )));
                }
                Ok(())
            }
            _ => Err(Error::InvalidRule(format!(
                "{} needs exactly one of 'tag' or 'earliest'",
                label
            ))),
        }
    }

    /// Outcome for `url`, or `None` when the rule does not apply
    pub fn apply(&self, url: &str) -> Option<&str> {
        if !self.all_of.iter().all(|k| url.contains(k.as_str())) {
            return None;
        }
        if !self.any_of.is_empty() && !self.any_of.iter().any(|k| url.contains(k.as_str())) {
            return None;
        }

        if let Some(tag) = &self.tag {
            return Some(tag.as_str());
        }

        self.earliest
            .iter()
            .filter_map(|a| url.find(a.keyword.as_str()).map(|pos| (pos, a)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, a)| a.tag.as_str())
    }

    fn outcome_tags(&self) -> impl Iterator<Item = &str> {
        self.tag
            .iter()
            .map(|t| t.as_str())
            .chain(self.earliest.iter().map(|a| a.tag.as_str()))
    }
}

/// Counts produced by a tagging pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagSummary {
    pub requests_tagged: usize,
    pub outliers: usize,
    pub by_tag: BTreeMap<String, usize>,
}

/// An ordered, validated rule cascade
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<TagRule>,
    vocabulary: Vec<String>,
}

impl RuleSet {
    /// Validate rules and derive the vocabulary in first-mention order
    pub fn new(rules: Vec<TagRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        for (i, rule) in rules.iter().enumerate() {
            rule.validate(i)?;
        }

        let mut vocabulary: Vec<String> = Vec::new();
        for tag in rules.iter().flat_map(|r| r.outcome_tags()) {
            if tag != OUTLIERS && !vocabulary.iter().any(|v| v == tag) {
                vocabulary.push(tag.to_string());
            }
        }
        vocabulary.push(OUTLIERS.to_string());

        Ok(Self { rules, vocabulary })
    }

    /// Load a rule set from its JSON form (an array of rules)
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Vec<TagRule> = serde_json::from_str(json)?;
        Self::new(rules)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rules)?)
    }

    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }

    /// Every tag the cascade can produce, `Outliers` last
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Vocabulary without `Outliers`, the dimensions a trace can populate
    pub fn trace_vocabulary(&self) -> Vec<String> {
        self.vocabulary
            .iter()
            .filter(|t| t.as_str() != OUTLIERS)
            .cloned()
            .collect()
    }

    /// Tag a single URL. Total: every input yields exactly one tag.
    pub fn tag(&self, url: &str) -> &str {
        for rule in &self.rules {
            if let Some(tag) = rule.apply(url) {
                return tag;
            }
        }
        OUTLIERS
    }

    /// Overwrite the tag of every request of every client
    pub fn tag_clients(&self, clients: &mut [Client]) -> TagSummary {
        let mut summary = TagSummary::default();

        for client in clients.iter_mut() {
            for session in client.sessions.iter_mut() {
                for request in session.requests.iter_mut() {
                    let tag = self.tag(&request.url);
                    if tag == OUTLIERS {
                        summary.outliers += 1;
                    }
                    *summary.by_tag.entry(tag.to_string()).or_insert(0) += 1;
                    summary.requests_tagged += 1;
                    request.action_tag = Some(tag.to_string());
                }
            }
        }

        debug!(
            requests = summary.requests_tagged,
            outliers = summary.outliers,
            "Tagged requests"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionTag, Request, Session};
    use chrono::Utc;

    fn tag(url: &str) -> String {
        RuleSet::builtin().tag(url).to_string()
    }

    #[test]
    fn test_home_page_before_ark() {
        assert_eq!(tag("/accueil/ark:/12345/"), "HomePage");
        assert_eq!(tag("/ark:/12345/accueil/"), "ViewingRessource");
        assert_eq!(tag("/ark:/12345/a/accueil/"), "ViewingRessource");
    }

    #[test]
    fn test_home_page_pairs() {
        assert_eq!(tag("/accueil/fr/und/x"), "HomePage");
        assert_eq!(tag("/services/und/accueil/"), "CollectionNavigation");
        assert_eq!(tag("/blog/accueil/"), "AccessGallicaBlog");
        assert_eq!(tag("/accueil/blog"), "HomePage");
        assert_eq!(tag("/AdvancedSearch/accueil/"), "AdvancedSearch");
        assert_eq!(tag("/sru?q=/accueil/"), "GallicaSearchEngine");
        assert_eq!(tag("/accueil/fr/search"), "HomePage");
        assert_eq!(tag("/accueil/fr/content/accueil-fr"), "HomePage");
    }

    #[test]
    fn test_download_and_reports() {
        assert_eq!(tag("/download/f1.pdf"), "DownloadRessource");
        assert_eq!(tag("/statistics/ark:/1"), "ResearchReportExtraction");
        assert_eq!(tag("/ark:/1/statistics"), "ViewingRessource");
        assert_eq!(tag("/ark:/1/details"), "ViewingRessource");
        assert_eq!(tag("/snippet/ark:/1"), "ResearchReportExtraction");
        assert_eq!(tag("/status/ark:/1"), "ResearchReportExtraction");
        assert_eq!(tag("/services/detail"), "ResearchReportExtraction");
    }

    #[test]
    fn test_resource_access() {
        assert_eq!(tag("/ark:/1/f1?sru=1"), "ViewingRessource");
        assert_eq!(tag("/sru?ark:/1"), "GallicaSearchEngine");
        assert_eq!(tag("/ark:/1/f1.texteImage"), "OCRTextExtraction");
        assert_eq!(tag("/search?ark:/1"), "GallicaSearchEngine");
        assert_eq!(tag("/ark:/1/search"), "ViewingRessource");
        assert_eq!(tag("/ark:/12148/bpt6k"), "ViewingRessource");
        assert_eq!(tag("/RequestDigitalElement?O=1"), "ViewingRessource");
        assert_eq!(tag("/dossiers/html/dossiers/x"), "ViewingRessource");
    }

    #[test]
    fn test_search_family() {
        assert_eq!(tag("/services/engine/advancedSearch/search"), "AdvancedSearch");
        assert_eq!(tag("/advanced/search"), "AdvancedSearch");
        assert_eq!(tag("/SRU?version=1.2"), "GallicaSearchEngine");
        assert_eq!(tag("/search/und"), "GallicaSearchEngine");
        assert_eq!(tag("/und/search"), "CollectionNavigation");
        assert_eq!(tag("/Search?lang=fr"), "GallicaSearchEngine");
        assert_eq!(tag("/Refinement?x"), "GallicaSearchEngine");
        assert_eq!(tag("/services/engine/Search"), "GallicaSearchEngine");
    }

    #[test]
    fn test_blog_and_collections() {
        assert_eq!(tag("/blog/und"), "AccessGallicaBlog");
        assert_eq!(tag("/und/blog"), "CollectionNavigation");
        assert_eq!(tag("/blog/2023/03"), "AccessGallicaBlog");
        assert_eq!(tag("/html/und/livres"), "CollectionNavigation");
        assert_eq!(tag("/edit/livres"), "CollectionNavigation");
        assert_eq!(tag("/cartes"), "CollectionNavigation");
        assert_eq!(tag("/enregistrements-sonores"), "CollectionNavigation");
        assert_eq!(tag("/essentiels/x"), "CollectionNavigation");
        assert_eq!(tag("/presse-et-revues"), "CollectionNavigation");
        assert_eq!(tag("/?lang=en"), "CollectionNavigation");
    }

    #[test]
    fn test_case_sensitive_and_fallback() {
        assert_eq!(tag("/ARK:/1"), "Outliers");
        assert_eq!(tag("/favicon.ico"), "Outliers");
        assert_eq!(tag(""), "Outliers");
        assert_eq!(tag("/BLOG"), "Outliers");
    }

    #[test]
    fn test_builtin_vocabulary() {
        let rules = RuleSet::builtin();
        let expected: Vec<String> = ActionTag::ALL.iter().map(|t| t.to_string()).collect();
        assert_eq!(rules.vocabulary(), expected.as_slice());
        assert_eq!(rules.trace_vocabulary().len(), 9);
    }

    #[test]
    fn test_from_json_and_earliest_tie_break() {
        let json = r#"[
            {"all_of": ["a", "b"], "earliest": [{"keyword": "a", "tag": "A"}, {"keyword": "b", "tag": "B"}]},
            {"any_of": ["x", "y"], "tag": "XY"}
        ]"#;
        let rules = RuleSet::from_json(json).unwrap();
        assert_eq!(rules.tag("/b/a"), "B");
        assert_eq!(rules.tag("/a/b"), "A");
        assert_eq!(rules.tag("/y"), "XY");
        assert_eq!(rules.tag("/z"), "Outliers");
        assert_eq!(rules.vocabulary(), &["A", "B", "XY", "Outliers"]);
    }

    #[test]
    fn test_overlapping_anchor_tie_goes_to_first_listed() {
        let rules = RuleSet::new(vec![TagRule::earliest(
            "overlap",
            &["advanced"],
            &[("advanced", "First"), ("adv", "Second")],
        )])
        .unwrap();
        assert_eq!(rules.tag("/advanced"), "First");
    }

    #[test]
    fn test_empty_rules_rejected() {
        assert!(matches!(RuleSet::from_json("[]"), Err(Error::EmptyVocabulary)));
        assert!(matches!(RuleSet::new(Vec::new()), Err(Error::EmptyVocabulary)));
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let both = r#"[{"all_of": ["a"], "tag": "A", "earliest": [{"keyword": "a", "tag": "A"}]}]"#;
        assert!(matches!(RuleSet::from_json(both), Err(Error::InvalidRule(_))));

        let neither = r#"[{"all_of": ["a"]}]"#;
        assert!(matches!(RuleSet::from_json(neither), Err(Error::InvalidRule(_))));

        let no_keywords = r#"[{"tag": "A"}]"#;
        assert!(matches!(RuleSet::from_json(no_keywords), Err(Error::InvalidRule(_))));

        let separator_in_tag = r#"[{"all_of": ["a"], "tag": "A,B"}]"#;
        assert!(matches!(RuleSet::from_json(separator_in_tag), Err(Error::InvalidRule(_))));
    }

    #[test]
    fn test_builtin_json_roundtrip() {
        let builtin = RuleSet::builtin();
        let json = builtin.to_json_pretty().unwrap();
        let reloaded = RuleSet::from_json(&json).unwrap();
        assert_eq!(reloaded.rules(), builtin.rules());
        assert_eq!(reloaded.tag("/accueil/ark:/1"), "HomePage");
    }

    #[test]
    fn test_tag_clients_overwrites_every_request() {
        let mut client = Client::new("c1");
        let mut stale = Request::new(Utc::now(), "/ark:/1");
        stale.action_tag = Some("Old".to_string());
        client.sessions.push(Session {
            session_index: 0,
            requests: vec![stale, Request::new(Utc::now(), "/robots.txt")],
        });
        let mut clients = vec![client];

        let summary = RuleSet::builtin().tag_clients(&mut clients);
        assert_eq!(summary.requests_tagged, 2);
        assert_eq!(summary.outliers, 1);
        let tags: Vec<_> = clients[0].sessions[0]
            .requests
            .iter()
            .map(|r| r.action_tag.clone().unwrap())
            .collect();
        assert_eq!(tags, vec!["ViewingRessource", "Outliers"]);
    }
}
