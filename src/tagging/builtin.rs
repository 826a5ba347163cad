//! The default Gallica cascade, expressed as data

use super::{RuleSet, TagRule};
use crate::models::ActionTag;

const HOME: &str = "HomePage";
const COLLECTIONS: &str = "CollectionNavigation";
const DOWNLOAD: &str = "DownloadRessource";
const VIEWING: &str = "ViewingRessource";
const SEARCH_ENGINE: &str = "GallicaSearchEngine";
const ADVANCED: &str = "AdvancedSearch";
const BLOG: &str = "AccessGallicaBlog";
const OCR: &str = "OCRTextExtraction";
const REPORTS: &str = "ResearchReportExtraction";

impl RuleSet {
    /// Rule cascade used when no custom rule set is selected
    pub fn builtin() -> Self {
        let mut rules = Vec::new();

        // Home page against every keyword that can share its URL
        for (keyword, tag) in [
            ("und", COLLECTIONS),
            ("blog", BLOG),
            ("AdvancedSearch", ADVANCED),
            ("sru", SEARCH_ENGINE),
            ("search", SEARCH_ENGINE),
            ("ark", VIEWING),
        ] {
            rules.push(TagRule::earliest(
                &format!("home-vs-{}", keyword),
                &[keyword, "/accueil/"],
                &[("/accueil/", HOME), (keyword, tag)],
            ));
        }
        rules.push(TagRule::fixed("home", &["/accueil/"], &[], HOME));

        rules.push(TagRule::fixed("download", &["download"], &[], DOWNLOAD));

        for keyword in ["statistic", "detail", "snippet", "status"] {
            rules.push(TagRule::earliest(
                &format!("report-vs-ark-{}", keyword),
                &["ark", keyword],
                &[(keyword, REPORTS), ("ark", VIEWING)],
            ));
        }
        rules.push(TagRule::fixed(
            "report",
            &[],
            &["statistic", "detail", "snippet", "status"],
            REPORTS,
        ));

        rules.push(TagRule::earliest(
            "ark-vs-sru",
            &["ark", "sru"],
            &[("ark", VIEWING), ("sru", SEARCH_ENGINE)],
        ));
        rules.push(TagRule::fixed("ocr", &["ark", "texteImage"], &[], OCR));
        rules.push(TagRule::earliest(
            "ark-vs-search",
            &["ark", "search"],
            &[("ark", VIEWING), ("search", SEARCH_ENGINE)],
        ));
        rules.push(TagRule::fixed("ark", &["ark"], &[], VIEWING));
        rules.push(TagRule::fixed(
            "digital-element",
            &["RequestDigitalElement"],
            &[],
            VIEWING,
        ));
        rules.push(TagRule::fixed("dossiers", &["dossiers"], &[], VIEWING));

        rules.push(TagRule::fixed(
            "advanced-search",
            &["advancedSearch", "search"],
            &[],
            ADVANCED,
        ));
        rules.push(TagRule::fixed(
            "advanced",
            &["advanced", "search"],
            &[],
            ADVANCED,
        ));

        rules.push(TagRule::fixed("sru", &[], &["sru", "SRU"], SEARCH_ENGINE));
        rules.push(TagRule::earliest(
            "search-vs-und",
            &["und", "search"],
            &[("search", SEARCH_ENGINE), ("und", COLLECTIONS)],
        ));
        rules.push(TagRule::fixed(
            "search-lang",
            &["Search", "lang"],
            &[],
            SEARCH_ENGINE,
        ));
        rules.push(TagRule::fixed(
            "refinement",
            &["Refinement"],
            &[],
            SEARCH_ENGINE,
        ));
        rules.push(TagRule::fixed(
            "search",
            &[],
            &["Search", "search"],
            SEARCH_ENGINE,
        ));

        rules.push(TagRule::earliest(
            "blog-vs-und",
            &["und", "blog"],
            &[("blog", BLOG), ("und", COLLECTIONS)],
        ));
        rules.push(TagRule::fixed("blog", &["blog"], &[], BLOG));

        rules.push(TagRule::fixed(
            "collections",
            &[],
            &[
                "und",
                "livres",
                "cartes",
                "enregistrements-sonores",
                "essentiels",
                "presse-et-revues",
                "lang",
            ],
            COLLECTIONS,
        ));

        RuleSet {
            rules,
            vocabulary: ActionTag::ALL.iter().map(|t| t.to_string()).collect(),
        }
    }
}
