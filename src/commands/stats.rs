//! Statistics commands over a collection's traces and sessions

use crate::analytics::{
    action_number, action_popularity, action_uniqueness, session_overview, session_stats,
    tag_counts, trace_popularity, trace_uniqueness, ClientSessionStats, Popularity,
    SessionOverview, StatSummary,
};
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::models::Client;
use crate::trace::{build_traces, client_traces, Trace};
use serde::{Deserialize, Serialize};

/// Which end of a popularity ranking to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ranking {
    Top,
    Bottom,
}

/// Whole sequences or individual actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Action,
}

impl Level {
    pub fn from_actions_flag(actions: bool) -> Self {
        if actions {
            Level::Action
        } else {
            Level::Trace
        }
    }
}

/// `(key, count)` pairs in report order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountReport {
    pub level: Level,
    pub entries: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// Sum of trace lengths
    pub action_number: usize,
    pub unique_actions: usize,
    pub traces: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub overview: SessionOverview,
    pub clients: Vec<ClientSessionStats>,
}

/// Load the clients of a collection
pub async fn collection_clients(db: &MetaDb, collection: &str) -> Result<Vec<Client>> {
    let collection = db.require_collection(collection).await?;
    db.load_clients(&collection.id).await
}

/// Traces of a collection, optionally for one client; fails when none exist
pub async fn collection_traces(
    db: &MetaDb,
    collection: &str,
    client: Option<&str>,
) -> Result<Vec<Trace>> {
    let clients = collection_clients(db, collection).await?;
    let traces = match client {
        Some(id) => client_traces(&clients, id),
        None => build_traces(&clients),
    };

    if traces.is_empty() {
        return Err(Error::NoData(match client {
            Some(id) => format!("no traces for client '{}' in '{}'", id, collection),
            None => format!(
                "no traces in '{}'; run 'clickpath tag' after ingesting",
                collection
            ),
        }));
    }
    Ok(traces)
}

fn popularity(traces: &[Trace], level: Level) -> Popularity {
    match level {
        Level::Trace => trace_popularity(traces),
        Level::Action => action_popularity(traces),
    }
}

/// Wire-format lines of every trace
pub async fn cmd_traces(db: &MetaDb, collection: &str, client: Option<&str>) -> Result<Vec<String>> {
    collection_traces(db, collection, client)
        .await?
        .iter()
        .map(Trace::to_wire)
        .collect()
}

pub async fn cmd_popularity(db: &MetaDb, collection: &str, level: Level) -> Result<CountReport> {
    let traces = collection_traces(db, collection, None).await?;
    Ok(CountReport {
        level,
        entries: popularity(&traces, level).entries().to_vec(),
    })
}

/// Total, unique and average; `DivideByZero` cannot occur on a non-empty set
pub async fn cmd_summary(db: &MetaDb, collection: &str, level: Level) -> Result<StatSummary> {
    let traces = collection_traces(db, collection, None).await?;
    let uniqueness = match level {
        Level::Trace => trace_uniqueness(&traces),
        Level::Action => action_uniqueness(&traces),
    };
    StatSummary::from_uniqueness(uniqueness)
}

pub async fn cmd_actions(db: &MetaDb, collection: &str) -> Result<ActionReport> {
    let traces = collection_traces(db, collection, None).await?;
    Ok(ActionReport {
        action_number: action_number(&traces),
        unique_actions: action_uniqueness(&traces).unique,
        traces: traces.len(),
    })
}

pub async fn cmd_ranking(
    db: &MetaDb,
    collection: &str,
    level: Level,
    ranking: Ranking,
    n: usize,
) -> Result<CountReport> {
    let traces = collection_traces(db, collection, None).await?;
    let popularity = popularity(&traces, level);
    let entries = match ranking {
        Ranking::Top => popularity.most_popular(n),
        Ranking::Bottom => popularity.least_popular(n),
    };
    Ok(CountReport { level, entries })
}

pub async fn cmd_sessions(
    db: &MetaDb,
    collection: &str,
    client: Option<&str>,
) -> Result<SessionReport> {
    let mut clients = collection_clients(db, collection).await?;
    if let Some(id) = client {
        clients.retain(|c| c.client_id == id);
    }
    Ok(SessionReport {
        overview: session_overview(&clients)?,
        clients: session_stats(&clients),
    })
}

/// Requests per tag, `Outliers` included; restricted to one tag when given
pub async fn cmd_tag_counts(
    db: &MetaDb,
    collection: &str,
    tag: Option<&str>,
) -> Result<Vec<(String, usize)>> {
    let clients = collection_clients(db, collection).await?;
    let counts = tag_counts(&clients);
    if counts.is_empty() {
        return Err(Error::NoData(format!(
            "'{}' has no tagged requests; run 'clickpath tag' first",
            collection
        )));
    }

    Ok(match tag {
        Some(tag) => vec![(tag.to_string(), counts.get(tag))],
        None => counts.entries().to_vec(),
    })
}

pub fn print_counts(title: &str, entries: &[(String, usize)]) {
    println!("\n{}\n", title);
    let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0).min(80);
    for (key, count) in entries {
        println!("  {:<width$}  {}", key, count, width = width);
    }
}

pub fn print_summary(level: Level, summary: &StatSummary) {
    let noun = match level {
        Level::Trace => "traces",
        Level::Action => "actions",
    };
    println!("Total {}: {}", noun, summary.total);
    println!("Unique {}: {}", noun, summary.unique);
    println!("Average: {:.4}", summary.average);
}

pub fn print_session_report(report: &SessionReport) {
    let o = &report.overview;
    println!("\nClients: {}", o.clients);
    println!("Sessions: {}", o.sessions);
    println!("Requests: {}", o.requests);
    println!("Mean requests per session: {:.2}", o.mean_requests_per_session);
    println!("Mean session duration: {:.1}s", o.mean_session_duration_secs);
    println!();
    for client in &report.clients {
        println!(
            "• {} ({} session(s)) requests {:?}, durations {:?}s",
            client.client_id,
            client.sessions_count,
            client.requests_per_session,
            client.session_durations
        );
        if !client.action_frequency.is_empty() {
            let actions: Vec<String> = client
                .action_frequency
                .iter()
                .map(|(a, c)| format!("{}={}", a, c))
                .collect();
            println!("  {}", actions.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Request, Session};
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        let db = MetaDb::connect(&config).await.unwrap();
        (db, tmp)
    }

    fn tagged_client(id: &str, sessions: &[&[&str]]) -> Client {
        let t0 = Utc.with_ymd_and_hms(2023, 3, 12, 8, 0, 0).unwrap();
        let mut client = Client::new(id);
        for (i, tags) in sessions.iter().enumerate() {
            client.sessions.push(Session {
                session_index: i,
                requests: tags
                    .iter()
                    .enumerate()
                    .map(|(j, tag)| {
                        let mut r = Request::new(t0 + Duration::seconds(j as i64 * 10), "/x");
                        r.action_tag = Some(tag.to_string());
                        r
                    })
                    .collect(),
            });
        }
        client
    }

    async fn seeded() -> (MetaDb, TempDir) {
        let (db, tmp) = setup_test_db().await;
        let collection = db.create_collection("c").await.unwrap();
        let clients = vec![
            tagged_client("c1", &[&["A", "B", "C"], &["Outliers"]]),
            tagged_client("c2", &[&["A", "Outliers", "B", "C"]]),
            tagged_client("c3", &[&["B"]]),
        ];
        db.append_batch(&collection.id, "f", "h", &clients)
            .await
            .unwrap();
        (db, tmp)
    }

    #[tokio::test]
    async fn test_traces_drop_outliers_and_empty_sessions() {
        let (db, _tmp) = seeded().await;
        let lines = cmd_traces(&db, "c", None).await.unwrap();
        assert_eq!(lines, vec!["c1;A,B,C", "c2;A,B,C", "c3;B"]);

        let one = cmd_traces(&db, "c", Some("c2")).await.unwrap();
        assert_eq!(one, vec!["c2;A,B,C"]);
        assert!(matches!(
            cmd_traces(&db, "c", Some("nobody")).await,
            Err(Error::NoData(_))
        ));
    }

    #[tokio::test]
    async fn test_summaries() {
        let (db, _tmp) = seeded().await;

        let traces = cmd_summary(&db, "c", Level::Trace).await.unwrap();
        assert_eq!((traces.total, traces.unique), (3, 2));
        assert_eq!(traces.average, 1.5);

        let actions = cmd_summary(&db, "c", Level::Action).await.unwrap();
        assert_eq!((actions.total, actions.unique), (7, 3));

        let report = cmd_actions(&db, "c").await.unwrap();
        assert_eq!(report.action_number, 7);
        assert_eq!(report.traces, 3);
    }

    #[tokio::test]
    async fn test_rankings() {
        let (db, _tmp) = seeded().await;

        let top = cmd_ranking(&db, "c", Level::Trace, Ranking::Top, 1).await.unwrap();
        assert_eq!(top.entries, vec![("A,B,C".to_string(), 2)]);

        let bottom = cmd_ranking(&db, "c", Level::Action, Ranking::Bottom, 2)
            .await
            .unwrap();
        assert_eq!(
            bottom.entries,
            vec![("A".to_string(), 2), ("C".to_string(), 2)]
        );

        let popularity = cmd_popularity(&db, "c", Level::Trace).await.unwrap();
        assert_eq!(popularity.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_tag_counts_and_sessions() {
        let (db, _tmp) = seeded().await;

        let all = cmd_tag_counts(&db, "c", None).await.unwrap();
        assert!(all.contains(&("Outliers".to_string(), 2)));
        let one = cmd_tag_counts(&db, "c", Some("B")).await.unwrap();
        assert_eq!(one, vec![("B".to_string(), 3)]);

        let report = cmd_sessions(&db, "c", Some("c1")).await.unwrap();
        assert_eq!(report.overview.sessions, 2);
        assert_eq!(report.clients[0].requests_per_session, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_untagged_collection_has_no_traces() {
        let (db, _tmp) = setup_test_db().await;
        let collection = db.create_collection("raw").await.unwrap();
        let mut client = Client::new("c1");
        client.sessions.push(Session {
            session_index: 0,
            requests: vec![Request::new(Utc::now(), "/accueil/")],
        });
        db.append_batch(&collection.id, "f", "h", &[client])
            .await
            .unwrap();

        assert!(matches!(
            cmd_traces(&db, "raw", None).await,
            Err(Error::NoData(_))
        ));
        assert!(matches!(
            cmd_tag_counts(&db, "raw", None).await,
            Err(Error::NoData(_))
        ));
    }
}
