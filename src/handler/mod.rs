// Handler module - the stats request/response contract
//
// Transport-agnostic: a transport hands over method, query and raw body and
// gets back a status code and JSON body. Routing is by method only:
//
//   OPTIONS -> 200 {}                                    (preflight)
//   GET     -> 200 {userId, stats} or the whole document (read)
//   POST    -> 200 {success, userId, stats, challengeDate} (write)
//   other   -> 405 {error: "Method not allowed"}
//
// The handler owns the merge: load the challenge's document, replace the
// user's entry, save it back. The store only reads and writes whole files.

mod error;
mod response;

/// Largest request body accepted by any transport
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub use error::StatsError;
pub use response::{StatsResponse, CONTENT_TYPE_JSON, CORS_HEADERS};

use axum::http::Method;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::store::StatsStore;

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters understood by GET
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsQuery {
    pub user_id: Option<String>,
    pub challenge_date: Option<String>,
}

impl StatsQuery {
    /// Parse a raw query string (without the leading `?`). Pairs are decoded
    /// one by one: unknown keys are skipped and the first value of a repeated
    /// key wins, so one odd pair never hides the others.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let Some(raw) = raw.filter(|q| !q.is_empty()) else {
            return query;
        };

        let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(raw) {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::debug!(query = %raw, error = %e, "Ignoring undecodable query string");
                return query;
            }
        };

        for (key, value) in pairs {
            let slot = match key.as_str() {
                "userId" => &mut query.user_id,
                "challengeDate" => &mut query.challenge_date,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

/// One inbound request, already stripped of its transport
#[derive(Debug, Clone)]
pub struct StatsRequest {
    pub method: Method,
    pub query: StatsQuery,
    pub body: Bytes,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Routes requests to the store. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct StatsHandler {
    store: Arc<StatsStore>,
}

impl StatsHandler {
    pub fn new(store: Arc<StatsStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StatsStore {
        &self.store
    }

    /// Handle one request to completion. Never fails: every error becomes a
    /// response.
    pub fn handle(&self, request: StatsRequest) -> StatsResponse {
        let result = match request.method {
            Method::OPTIONS => Ok(json!({})),
            Method::GET => self.read(&request.query),
            Method::POST => self.write(&request.body),
            _ => Err(StatsError::MethodNotAllowed),
        };

        match result {
            Ok(body) => StatsResponse::ok(body),
            Err(err) => {
                match &err {
                    StatsError::Storage(msg) => tracing::error!(
                        method = %request.method,
                        error = %msg,
                        "Stats storage failure"
                    ),
                    other => tracing::warn!(
                        method = %request.method,
                        error = %other,
                        "Stats request rejected"
                    ),
                }
                err.into()
            }
        }
    }

    /// GET: one user's stats, or the whole document when no userId is given
    fn read(&self, query: &StatsQuery) -> Result<Value, StatsError> {
        let challenge = self.store.resolve(query.challenge_date.as_deref())?;
        let document = self.store.load_challenge(&challenge)?;

        match query.user_id.as_deref().filter(|u| !u.is_empty()) {
            Some(user_id) => {
                let stats = document.get(user_id).cloned();
                tracing::debug!(
                    user_id = %user_id,
                    challenge = %challenge,
                    found = stats.is_some(),
                    "Read user stats"
                );
                Ok(json!({
                    "userId": user_id,
                    "stats": stats.unwrap_or(Value::Null),
                }))
            }
            None => {
                tracing::debug!(challenge = %challenge, users = document.len(), "Read all stats");
                Ok(document.into_value())
            }
        }
    }

    /// POST: replace one user's entry in the challenge named by the payload
    fn write(&self, body: &[u8]) -> Result<Value, StatsError> {
        let payload: Value = serde_json::from_slice(body).map_err(|_| StatsError::Parse)?;

        let user_id = payload
            .get("userId")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(StatsError::missing_fields)?;
        let stats = payload
            .get("stats")
            .filter(|s| is_present(s))
            .ok_or_else(StatsError::missing_fields)?;

        let challenge = self.store.resolve(current_challenge(stats))?;

        self.store.with_write_lock(&challenge, || {
            let mut document = self.store.load_challenge(&challenge)?;
            let replaced = document.insert(user_id, stats.clone()).is_some();
            self.store.save_challenge(&document, &challenge)?;

            tracing::info!(
                user_id = %user_id,
                challenge = %challenge,
                replaced,
                users = document.len(),
                "Saved user stats"
            );
            Ok::<_, StatsError>(())
        })?;

        Ok(json!({
            "success": true,
            "userId": user_id,
            "stats": stats,
            "challengeDate": challenge.as_str(),
        }))
    }
}

/// The only field of a stats payload the service reads: the challenge it
/// belongs to. Non-string or empty values count as absent.
pub fn current_challenge(stats: &Value) -> Option<&str> {
    stats
        .get("currentChallenge")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
}

/// Whether a required field carries a value (null, false, 0, "", [] and {}
/// count as missing)
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::StoreOptions;
    use axum::http::StatusCode;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn handler(dir: &TempDir) -> StatsHandler {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let store = StatsStore::new(dir.path(), Arc::new(clock), StoreOptions::default());
        StatsHandler::new(Arc::new(store))
    }

    fn request(method: Method, query: &str, body: &str) -> StatsRequest {
        StatsRequest {
            method,
            query: StatsQuery::parse(Some(query)),
            body: Bytes::from(body.to_string()),
        }
    }

    fn post(h: &StatsHandler, body: Value) -> StatsResponse {
        h.handle(request(Method::POST, "", &body.to_string()))
    }

    fn get(h: &StatsHandler, query: &str) -> StatsResponse {
        h.handle(request(Method::GET, query, ""))
    }

    #[test]
    fn test_query_parse() {
        let q = StatsQuery::parse(Some("userId=u%201&challengeDate=2024-01-01&extra=1"));
        assert_eq!(q.user_id.as_deref(), Some("u 1"));
        assert_eq!(q.challenge_date.as_deref(), Some("2024-01-01"));
        assert_eq!(StatsQuery::parse(None), StatsQuery::default());
        assert_eq!(StatsQuery::parse(Some("")), StatsQuery::default());
    }

    #[test]
    fn test_query_parse_keeps_first_of_repeated_keys() {
        let q = StatsQuery::parse(Some("userId=a&userId=b&challengeDate=2024-01-01"));
        assert_eq!(q.user_id.as_deref(), Some("a"));
        assert_eq!(q.challenge_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_query_parse_tolerates_raw_cgi_strings() {
        // QUERY_STRING arrives unescaped from some servers
        let q = StatsQuery::parse(Some("userId=a b&challengeDate=2024-01-01"));
        assert_eq!(q.user_id.as_deref(), Some("a b"));
        assert_eq!(q.challenge_date.as_deref(), Some("2024-01-01"));

        let q = StatsQuery::parse(Some("userId=u+1&junk&challengeDate=%zz"));
        assert_eq!(q.user_id.as_deref(), Some("u 1"));
        assert_eq!(q.challenge_date.as_deref(), Some("%zz"));
    }

    #[test]
    fn test_get_with_repeated_user_reads_one_entry() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        post(&h, json!({"userId": "a", "stats": {"v": 1}}));
        post(&h, json!({"userId": "b", "stats": {"v": 2}}));

        let resp = get(&h, "userId=a&userId=b");
        assert_eq!(resp.body, json!({"userId": "a", "stats": {"v": 1}}));
    }

    #[test]
    fn test_preflight_returns_empty_object() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let resp = h.handle(request(Method::OPTIONS, "", ""));
        assert_eq!(resp, StatsResponse::ok(json!({})));
        assert!(fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_other_methods_rejected() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        for method in [Method::PUT, Method::DELETE, Method::PATCH] {
            let resp = h.handle(request(method, "", ""));
            assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(resp.body, json!({"error": "Method not allowed"}));
        }
    }

    #[test]
    fn test_post_then_get_scenario() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let stats = json!({"score": 10, "currentChallenge": "2024-01-01"});
        let resp = post(&h, json!({"userId": "u1", "stats": stats}));
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(
            resp.body.to_string(),
            r#"{"success":true,"userId":"u1","stats":{"score":10,"currentChallenge":"2024-01-01"},"challengeDate":"2024-01-01"}"#
        );

        let resp = get(&h, "userId=u1&challengeDate=2024-01-01");
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(
            resp.body.to_string(),
            r#"{"userId":"u1","stats":{"score":10,"currentChallenge":"2024-01-01"}}"#
        );
        assert!(tmp.path().join("stats_2024-01-01.json").exists());
    }

    #[test]
    fn test_post_without_challenge_targets_today() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let resp = post(&h, json!({"userId": "u1", "stats": {"score": 1}}));
        assert_eq!(resp.body["challengeDate"], "2024-06-01");
        assert!(tmp.path().join("stats_2024-06-01.json").exists());

        // GET without challengeDate reads today's file too
        let resp = get(&h, "userId=u1");
        assert_eq!(resp.body["stats"], json!({"score": 1}));
    }

    #[test]
    fn test_get_unknown_user_is_null_not_404() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let resp = get(&h, "userId=ghost&challengeDate=2024-01-01");
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, json!({"userId": "ghost", "stats": null}));
    }

    #[test]
    fn test_get_without_data_is_empty_object() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let resp = get(&h, "challengeDate=1999-01-01");
        assert_eq!(resp, StatsResponse::ok(json!({})));
    }

    #[test]
    fn test_get_all_lists_every_user_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let day = "2024-02-02";
        post(&h, json!({"userId": "a", "stats": {"v": 1, "currentChallenge": day}}));
        post(&h, json!({"userId": "b", "stats": {"v": 2, "currentChallenge": day}}));
        post(&h, json!({"userId": "a", "stats": {"v": 3, "currentChallenge": day}}));
        // Different challenge: must not leak into this one
        post(&h, json!({"userId": "c", "stats": {"v": 4, "currentChallenge": "2024-02-03"}}));

        let resp = get(&h, &format!("challengeDate={}", day));
        assert_eq!(
            resp.body,
            json!({
                "a": {"v": 3, "currentChallenge": day},
                "b": {"v": 2, "currentChallenge": day},
            })
        );
    }

    #[test]
    fn test_second_post_overwrites_entirely() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        post(&h, json!({"userId": "u1", "stats": {"wins": 5, "streak": 2}}));
        post(&h, json!({"userId": "u1", "stats": {"losses": 1}}));

        let resp = get(&h, "userId=u1");
        assert_eq!(resp.body["stats"], json!({"losses": 1}));
    }

    #[test]
    fn test_empty_user_or_missing_stats_is_400() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let bodies = [
            json!({"userId": "", "stats": {"score": 1}}),
            json!({"userId": "u1"}),
            json!({"stats": {"score": 1}}),
            json!({"userId": "u1", "stats": null}),
            json!({"userId": "u1", "stats": {}}),
            json!({"userId": "u1", "stats": ""}),
            json!({"userId": 42, "stats": {"score": 1}}),
            json!(["userId", "stats"]),
        ];

        for body in bodies {
            let resp = post(&h, body.clone());
            assert_eq!(resp.status, StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(resp.body, json!({"error": "userId and stats required"}));
        }
        assert!(fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_unparsable_body_is_invalid_json() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        for body in ["", "{", "userId=u1", "{\"userId\": \"u1\","] {
            let resp = h.handle(request(Method::POST, "", body));
            assert_eq!(resp.status, StatusCode::BAD_REQUEST);
            assert_eq!(resp.body, json!({"error": "Invalid JSON"}));
        }
    }

    #[test]
    fn test_scalar_and_array_stats_are_opaque() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        post(&h, json!({"userId": "n", "stats": 7}));
        post(&h, json!({"userId": "l", "stats": [1, "two"]}));

        let resp = get(&h, "");
        assert_eq!(resp.body, json!({"n": 7, "l": [1, "two"]}));
    }

    #[test]
    fn test_path_escaping_challenge_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let resp = post(
            &h,
            json!({"userId": "u1", "stats": {"currentChallenge": "../../etc/passwd"}}),
        );
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.body, json!({"error": "Invalid challengeDate"}));

        let resp = get(&h, "challengeDate=..%2Fsecrets");
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_corrupt_file_is_500() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);
        fs::write(tmp.path().join("stats_2024-06-01.json"), "{oops").unwrap();

        let resp = get(&h, "");
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body["error"]
            .as_str()
            .unwrap()
            .starts_with("Malformed stats file"));

        let resp = post(&h, json!({"userId": "u1", "stats": {"score": 1}}));
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        // The broken file is left alone, not replaced
        assert_eq!(
            fs::read_to_string(tmp.path().join("stats_2024-06-01.json")).unwrap(),
            "{oops"
        );
    }

    #[test]
    fn test_concurrent_writers_keep_every_user() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp);

        let threads: Vec<_> = (0..16)
            .map(|i| {
                let h = h.clone();
                std::thread::spawn(move || {
                    post(&h, json!({"userId": format!("user{}", i), "stats": {"n": i}}))
                })
            })
            .collect();
        for t in threads {
            assert_eq!(t.join().unwrap().status, StatusCode::OK);
        }

        let doc = h.store().load(None).unwrap();
        assert_eq!(doc.len(), 16);
    }

    #[test]
    fn test_unserialized_atomic_writers_never_fail() {
        let tmp = TempDir::new().unwrap();
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let options = StoreOptions {
            atomic_writes: true,
            serialize_writes: false,
        };
        let h = StatsHandler::new(Arc::new(StatsStore::new(tmp.path(), Arc::new(clock), options)));

        for round in 0..10 {
            let threads: Vec<_> = (0..16)
                .map(|i| {
                    let h = h.clone();
                    std::thread::spawn(move || {
                        post(&h, json!({"userId": format!("user{}", i), "stats": {"round": round}}))
                    })
                })
                .collect();
            for t in threads {
                let resp = t.join().unwrap();
                assert_eq!(resp.status, StatusCode::OK, "round {}: {}", round, resp.body);
            }
        }

        // Last write wins: the file is whole and holds at least one writer
        let doc = h.store().load(None).unwrap();
        assert!(!doc.is_empty());
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["stats_2024-06-01.json".to_string()]);
    }

    #[test]
    fn test_current_challenge_extraction() {
        assert_eq!(
            current_challenge(&json!({"currentChallenge": "2024-01-01"})),
            Some("2024-01-01")
        );
        assert_eq!(current_challenge(&json!({"currentChallenge": ""})), None);
        assert_eq!(current_challenge(&json!({"currentChallenge": 20240101})), None);
        assert_eq!(current_challenge(&json!([1, 2])), None);
        assert_eq!(current_challenge(&json!("2024-01-01")), None);
    }
}
