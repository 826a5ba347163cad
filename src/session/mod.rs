//! Identity grouping and sessionization
//!
//! Requests are grouped by client id, ordered by time with a stable sort, and
//! split into sessions wherever the gap between consecutive requests strictly
//! exceeds the session time limit.

use crate::models::{Client, Request, Session};
use crate::parse::ParsedRow;
use std::collections::HashMap;
use tracing::debug;

/// Group rows by client id, keeping clients in first-seen order.
///
/// The first non-empty user agent seen for a client is kept.
pub fn group_by_client(rows: Vec<ParsedRow>) -> Vec<(Client, Vec<Request>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Client, Vec<Request>)> = Vec::new();

    for row in rows {
        let slot = match index.get(&row.client_id) {
            Some(&i) => i,
            None => {
                index.insert(row.client_id.clone(), groups.len());
                groups.push((Client::new(row.client_id.clone()), Vec::new()));
                groups.len() - 1
            }
        };

        let (client, requests) = &mut groups[slot];
        if client.user_agent.is_none() {
            client.user_agent = row.user_agent;
        }
        requests.push(row.request);
    }

    groups
}

/// Split one client's requests into sessions.
///
/// Requests with equal timestamps keep their input order and never split.
pub fn sessionize(mut requests: Vec<Request>, time_limit_secs: i64) -> Vec<Session> {
    requests.sort_by_key(|r| r.timestamp);

    let limit_ms = time_limit_secs.saturating_mul(1000);
    let mut sessions: Vec<Session> = Vec::new();
    let mut current: Vec<Request> = Vec::new();

    for request in requests {
        if let Some(prev) = current.last() {
            let gap_ms = (request.timestamp - prev.timestamp).num_milliseconds();
            if gap_ms > limit_ms {
                sessions.push(Session {
                    session_index: sessions.len(),
                    requests: std::mem::take(&mut current),
                });
            }
        }
        current.push(request);
    }

    if !current.is_empty() {
        sessions.push(Session {
            session_index: sessions.len(),
            requests: current,
        });
    }

    sessions
}

/// Full identity + sessionization pass over a batch of normalized rows
pub fn build_clients(rows: Vec<ParsedRow>, time_limit_secs: i64) -> Vec<Client> {
    let clients: Vec<Client> = group_by_client(rows)
        .into_iter()
        .map(|(mut client, requests)| {
            client.sessions = sessionize(requests, time_limit_secs);
            client
        })
        .collect();

    debug!(
        clients = clients.len(),
        sessions = clients.iter().map(|c| c.sessions.len()).sum::<usize>(),
        "Sessionized batch"
    );
    clients
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 12, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn row(client: &str, secs: i64, url: &str) -> ParsedRow {
        ParsedRow {
            client_id: client.to_string(),
            user_agent: None,
            request: Request::new(t(secs), url),
        }
    }

    #[test]
    fn test_gap_above_limit_splits() {
        let requests = vec![
            Request::new(t(0), "/a"),
            Request::new(t(10), "/b"),
            Request::new(t(4000), "/c"),
        ];
        let sessions = sessionize(requests, 3600);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].requests.len(), 2);
        assert_eq!(sessions[1].requests.len(), 1);
        assert_eq!(sessions[1].session_index, 1);
        assert_eq!(sessions[1].requests[0].url, "/c");
    }

    #[test]
    fn test_gap_equal_to_limit_does_not_split() {
        let requests = vec![Request::new(t(0), "/a"), Request::new(t(3600), "/b")];
        assert_eq!(sessionize(requests, 3600).len(), 1);
    }

    #[test]
    fn test_single_request_and_empty_input() {
        assert_eq!(sessionize(vec![Request::new(t(5), "/a")], 3600).len(), 1);
        assert!(sessionize(Vec::new(), 3600).is_empty());
    }

    #[test]
    fn test_unordered_input_is_sorted_stably() {
        let requests = vec![
            Request::new(t(20), "/late"),
            Request::new(t(10), "/first"),
            Request::new(t(10), "/second"),
        ];
        let sessions = sessionize(requests, 3600);
        let urls: Vec<&str> = sessions[0].requests.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["/first", "/second", "/late"]);
    }

    #[test]
    fn test_session_invariants_hold() {
        let limit = 60;
        let secs = [0, 30, 200, 210, 211, 500, 1000, 1059];
        let requests: Vec<Request> = secs.iter().map(|&s| Request::new(t(s), "/x")).collect();
        let sessions = sessionize(requests, limit);

        for (i, session) in sessions.iter().enumerate() {
            assert_eq!(session.session_index, i);
            assert!(!session.requests.is_empty());
            for pair in session.requests.windows(2) {
                assert!((pair[1].timestamp - pair[0].timestamp).num_seconds() <= limit);
            }
        }
        for pair in sessions.windows(2) {
            let gap = pair[1].requests[0].timestamp - pair[0].requests.last().unwrap().timestamp;
            assert!(gap.num_seconds() > limit);
        }
        assert_eq!(sessions.len(), 4);
    }

    #[test]
    fn test_build_clients_groups_by_id() {
        let mut first = row("10.0.0.1", 0, "/a");
        first.user_agent = Some("curl/8".to_string());
        let rows = vec![
            first,
            row("10.0.0.2", 5, "/b"),
            row("10.0.0.1", 5000, "/c"),
        ];
        let clients = build_clients(rows, 3600);
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].client_id, "10.0.0.1");
        assert_eq!(clients[0].user_agent.as_deref(), Some("curl/8"));
        assert_eq!(clients[0].sessions.len(), 2);
        assert_eq!(clients[1].sessions.len(), 1);
    }
}
