//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the content and auth APIs and
//! run the full refresh, discovery, fetch and persist cycle end-to-end.

use chrono::{Duration, Utc};
use emote_harvester::config::{parse_config, Config};
use emote_harvester::credential::{AuditLog, Cookie, CredentialStore, SqliteStore};
use emote_harvester::harvester::ConcurrentFetcher;
use emote_harvester::output::{PersistError, PersistResult, Persister};
use emote_harvester::{
    Credential, CredentialError, FetchError, FetchOutcome, HarvestError, Harvester, Resource,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/bapis/main.community.interface.emote.EmoteService/AllPackages";
const DETAIL_PATH: &str = "/bapis/main.community.interface.emote.EmoteService/PackageDetail";

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server_uri: &str, start_id: i64, fallback_end_id: i64) -> Config {
    parse_config(&format!(
        r#"
[scan]
start-id = {start_id}
fallback-end-id = {fallback_end_id}
lookahead = 0
concurrency = 4

[account]
id = 42

[http]
timeout-ms = 200
retry-attempts = 3
retry-delay-ms = 10

[api]
base-url = "{server_uri}"
app-key = "content-key"
app-secret = "content-secret"

[auth]
refresh-url = "{server_uri}/refresh"
app-key = "auth-key"
app-secret = "auth-secret"

[storage]
database-path = "./unused.db"

[output]
directory = "./unused"
"#
    ))
    .expect("test config is valid")
}

fn store_with_credential(age: Duration) -> Arc<Mutex<SqliteStore>> {
    let mut store = SqliteStore::new_in_memory().unwrap();
    store
        .update(&Credential {
            account_id: 42,
            access_token: "old-access".to_string(),
            refresh_token: "old-refresh".to_string(),
            cookies: vec![Cookie::new("SESSDATA", "old")],
            last_refreshed: Utc::now() - age,
        })
        .unwrap();
    Arc::new(Mutex::new(store))
}

/// Persister that keeps everything it is given
#[derive(Default)]
struct RecordingPersister {
    persisted: Mutex<Vec<Resource>>,
}

impl RecordingPersister {
    fn ids(&self) -> Vec<i64> {
        self.persisted.lock().unwrap().iter().map(|r| r.id).collect()
    }
}

impl Persister for RecordingPersister {
    fn persist(&self, resource: &Resource) -> PersistResult<()> {
        self.persisted.lock().unwrap().push(resource.clone());
        Ok(())
    }
}

/// Persister that rejects everything
struct FailingPersister;

impl Persister for FailingPersister {
    fn persist(&self, _resource: &Resource) -> PersistResult<()> {
        Err(PersistError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
}

fn package_body(id: i64, text: &str) -> serde_json::Value {
    json!({
        "code": 0,
        "message": "0",
        "data": {
            "package": {
                "id": id,
                "text": text,
                "url": format!("http://i0.example.com/{}.png", id),
                "resource_type": 1,
                "emote": [
                    {"text": "[one]", "url": "http://i0.example.com/one.png"},
                    {"text": "[two]", "url": "http://i0.example.com/two.png", "gif_url": "http://i0.example.com/two.gif"}
                ]
            }
        }
    })
}

fn empty_body() -> serde_json::Value {
    json!({"code": 0, "message": "0", "data": {}})
}

#[tokio::test]
async fn test_full_harvest_mixed_outcomes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(package_body(10, "[Doge]")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Slower than the client timeout on every attempt
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "12"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(empty_body())
                .set_delay(std::time::Duration::from_millis(1000)),
        )
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 10, 12);
    let persister = Arc::new(RecordingPersister::default());
    let harvester = Harvester::new(
        Arc::new(config),
        store_with_credential(Duration::days(1)),
        persister.clone(),
    );

    let stats = harvester.run().await.expect("run completes");

    // Listing is not mocked, so discovery falls back
    assert_eq!(stats.upper_bound, 12);
    assert_eq!(stats.requested, 3);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.empty, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.failures_by_kind.get("transport"), Some(&1));
    assert_eq!(stats.persisted, 1);

    assert_eq!(persister.ids(), vec![10]);
    let stored = persister.persisted.lock().unwrap()[0].clone();
    assert_eq!(stored.display_text, "Doge");
    assert_eq!(stored.icon_url, "https://i0.example.com/10.png");
    assert_eq!(stored.resource_type, 1);
    assert_eq!(stored.sub_item_count(), 2);
}

#[tokio::test]
async fn test_discovery_takes_max_of_both_pages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("pn", "1"))
        .and(query_param("access_key", "old-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"total": 250, "packages": [{"id": 300}, {"id": 5}]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("pn", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"total": 250, "packages": [{"id": 120}]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 299, 299);
    let harvester = Harvester::new(
        Arc::new(config),
        store_with_credential(Duration::days(1)),
        Arc::new(RecordingPersister::default()),
    );

    let stats = harvester.run().await.unwrap();
    assert_eq!(stats.upper_bound, 300);
    assert_eq!(stats.requested, 2);
    assert_eq!(stats.empty, 2);
}

#[tokio::test]
async fn test_discovery_falls_back_when_last_page_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("pn", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"total": 250, "packages": [{"id": 300}]}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("pn", "3"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 1, 4);
    let harvester = Harvester::new(
        Arc::new(config),
        store_with_credential(Duration::days(1)),
        Arc::new(RecordingPersister::default()),
    );

    let stats = harvester.run().await.unwrap();
    assert_eq!(stats.upper_bound, 4);
    assert_eq!(stats.requested, 4);
}

#[tokio::test]
async fn test_stale_credential_refreshed_before_listing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {
                "token_info": {"mid": 42, "access_token": "new-access", "refresh_token": "new-refresh"},
                "cookie_info": {"cookies": [{"name": "SESSDATA", "value": "new"}]}
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("access_key", "new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"total": 1, "packages": [{"id": 2}]}
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .mount(&mock_server)
        .await;

    let store = store_with_credential(Duration::days(45));
    let config = create_test_config(&mock_server.uri(), 1, 10);
    let harvester = Harvester::new(
        Arc::new(config),
        Arc::clone(&store),
        Arc::new(RecordingPersister::default()),
    );

    let stats = harvester.run().await.unwrap();
    assert_eq!(stats.upper_bound, 2);
    assert_eq!(stats.requested, 2);

    let guard = store.lock().unwrap();
    assert_eq!(guard.get(42).unwrap().unwrap().access_token, "new-access");
    assert_eq!(guard.refresh_history(42).unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_refresh_aborts_run() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": -101, "message": "account not logged in"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let persister = Arc::new(RecordingPersister::default());
    let config = create_test_config(&mock_server.uri(), 1, 10);
    let harvester = Harvester::new(
        Arc::new(config),
        store_with_credential(Duration::days(45)),
        persister.clone(),
    );

    let err = harvester.run().await.unwrap_err();
    assert!(matches!(
        err,
        HarvestError::Credential(CredentialError::Rejected { code: -101, .. })
    ));
    assert!(persister.ids().is_empty());
}

#[tokio::test]
async fn test_missing_credential_aborts_run() {
    let mock_server = MockServer::start().await;
    let config = create_test_config(&mock_server.uri(), 1, 10);
    let harvester = Harvester::new(
        Arc::new(config),
        Arc::new(Mutex::new(SqliteStore::new_in_memory().unwrap())),
        Arc::new(RecordingPersister::default()),
    );

    let err = harvester.run().await.unwrap_err();
    assert!(matches!(
        err,
        HarvestError::Credential(CredentialError::NotFound(42))
    ));
}

#[tokio::test]
async fn test_persist_failures_counted_not_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(package_body(1, "One")))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(package_body(2, "Two")))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 1, 2);
    let harvester = Harvester::new(
        Arc::new(config),
        store_with_credential(Duration::days(1)),
        Arc::new(FailingPersister),
    );

    let stats = harvester.run().await.unwrap();
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.persisted, 0);
    assert_eq!(stats.persist_failed, 2);
}

#[tokio::test]
async fn test_status_and_application_errors_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "1"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": -352, "message": "risk"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = Arc::new(create_test_config(&mock_server.uri(), 1, 3));
    let credential = Arc::new(Credential {
        account_id: 42,
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        cookies: vec![],
        last_refreshed: Utc::now(),
    });
    let ids: BTreeSet<i64> = (1..=3).collect();

    let mut outcomes = ConcurrentFetcher::new(config)
        .fetch_all(&ids, credential, 3)
        .await
        .unwrap();
    outcomes.sort_by_key(FetchOutcome::id);

    assert_eq!(
        outcomes[..2],
        [
            FetchOutcome::Failure {
                id: 1,
                error: FetchError::Status(502)
            },
            FetchOutcome::Failure {
                id: 2,
                error: FetchError::Application {
                    code: -352,
                    message: "risk".to_string()
                }
            },
        ]
    );
    assert!(matches!(
        outcomes[2],
        FetchOutcome::Failure {
            id: 3,
            error: FetchError::Malformed(_)
        }
    ));
}

#[tokio::test]
async fn test_package_with_other_id_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(package_body(7, "Seven")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = Arc::new(create_test_config(&mock_server.uri(), 1, 2));
    let credential = Arc::new(Credential {
        account_id: 42,
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        cookies: vec![],
        last_refreshed: Utc::now(),
    });
    let ids: BTreeSet<i64> = (1..=2).collect();

    let mut outcomes = ConcurrentFetcher::new(config)
        .fetch_all(&ids, credential, 2)
        .await
        .unwrap();
    outcomes.sort_by_key(FetchOutcome::id);

    assert_eq!(outcomes.len(), 2);
    for (outcome, expected_id) in outcomes.iter().zip([1, 2]) {
        assert_eq!(outcome.id(), expected_id);
        assert!(matches!(
            outcome,
            FetchOutcome::Failure {
                error: FetchError::Malformed(_),
                ..
            }
        ));
    }
}

#[tokio::test]
async fn test_one_outcome_per_id_at_any_width() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .mount(&mock_server)
        .await;

    let config = Arc::new(create_test_config(&mock_server.uri(), 1, 30));
    let credential = Arc::new(Credential {
        account_id: 42,
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        cookies: vec![],
        last_refreshed: Utc::now(),
    });
    let ids: BTreeSet<i64> = (1..=30).collect();

    for width in [1, 5, 20] {
        let outcomes = ConcurrentFetcher::new(Arc::clone(&config))
            .fetch_all(&ids, Arc::clone(&credential), width)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), ids.len(), "width {}", width);
        let seen: BTreeSet<i64> = outcomes.iter().map(FetchOutcome::id).collect();
        assert_eq!(seen, ids, "width {}", width);
        assert!(outcomes.iter().all(FetchOutcome::is_empty));
    }
}
