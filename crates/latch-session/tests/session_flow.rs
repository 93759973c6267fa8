//! End-to-end tests for the session lifecycle against a mock backend.

use std::sync::Arc;

use latch_session::{
    ApiError, AuthClient, AuthState, ClientIdentity, FileStore, KeyValueStore, LocalSignalBus,
    LogoutSignal, MemoryCookieJar, MemoryStore, RecordingNavigator, ReqwestCookieWriter,
    SessionConfig, SessionManager, SignalBus, StorageKey,
};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use serde_json::json;
use wiremock::matchers::{body_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    session: SessionManager,
    storage: Arc<MemoryStore>,
    cookies: Arc<MemoryCookieJar>,
    bus: Arc<LocalSignalBus>,
    navigator: Arc<RecordingNavigator>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_for(server: &MockServer) -> SessionConfig {
    init_tracing();

    SessionConfig {
        api_url: server.uri(),
        identity_lookup_url: format!("{}/ip", server.uri()),
        ..SessionConfig::default()
    }
}

fn harness(server: &MockServer) -> Harness {
    let config = config_for(server);

    let storage = Arc::new(MemoryStore::new());
    let cookies = Arc::new(MemoryCookieJar::new());
    let bus = Arc::new(LocalSignalBus::new());
    let navigator = Arc::new(RecordingNavigator::new());

    let session = SessionManager::builder(config)
        .storage(storage.clone())
        .cookie_writer(cookies.clone())
        .signal_bus(bus.clone())
        .navigator(navigator.clone())
        .build()
        .unwrap();

    Harness {
        session,
        storage,
        cookies,
        bus,
        navigator,
    }
}

async fn mount_login_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "email": "a@b.com",
            "password": "pw",
            "clientIdentity": "id1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "T",
            "jwtToken": "J",
            "clientIpAddress": "id1"
        })))
        .mount(server)
        .await;
}

async fn mount_lookup(server: &MockServer, template: ResponseTemplate, hits: u64) {
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(template)
        .expect(hits)
        .mount(server)
        .await;
}

fn assert_all_cleared(h: &Harness) {
    for key in StorageKey::ALL {
        assert!(h.storage.get(key.as_str()).is_none(), "{key:?} left set");
    }
    assert_eq!(h.cookies.live_count(), 0);
    assert_eq!(h.session.auth_state(), AuthState::LoggedOut);
}

// ==================== Bootstrap ====================

#[tokio::test]
async fn test_init_is_idempotent() {
    let server = MockServer::start().await;
    mount_lookup(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "ip": "1.2.3.4" })),
        1,
    )
    .await;
    let h = harness(&server);

    let mut identities = Vec::new();
    for _ in 0..5 {
        identities.push(h.session.init().await);
    }

    assert_eq!(h.bus.listener_count(), 1);
    assert!(identities.iter().all(|id| id.as_str() == "1.2.3.4"));
}

#[tokio::test]
async fn test_init_from_cloned_handles_installs_one_listener() {
    let server = MockServer::start().await;
    mount_lookup(&server, ResponseTemplate::new(500), 0).await;
    let h = harness(&server);
    h.storage
        .set(StorageKey::ClientIdentity.as_str(), "203.0.113.9");

    let a = h.session.clone();
    let b = h.session.clone();
    tokio::join!(a.init(), b.init(), h.session.init());

    assert_eq!(h.bus.listener_count(), 1);
}

#[tokio::test]
async fn test_persisted_identity_is_stable_without_network() {
    let server = MockServer::start().await;
    mount_lookup(&server, ResponseTemplate::new(500), 0).await;
    let h = harness(&server);
    h.storage
        .set(StorageKey::ClientIdentity.as_str(), "203.0.113.9");

    let identity = h.session.init().await;

    assert_eq!(identity.as_str(), "203.0.113.9");
}

#[tokio::test]
async fn test_failed_lookup_falls_back_to_generated_identity() {
    let server = MockServer::start().await;
    mount_lookup(&server, ResponseTemplate::new(502), 1).await;
    let h = harness(&server);

    let identity = h.session.init().await;

    assert!(identity.is_fallback());
    assert_eq!(h.session.client_identity(), Some(identity));
}

#[tokio::test]
async fn test_successful_lookup_persists_address() {
    let server = MockServer::start().await;
    mount_lookup(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "ip": "1.2.3.4" })),
        1,
    )
    .await;
    let h = harness(&server);

    h.session.init().await;

    assert_eq!(
        h.storage.get(StorageKey::ClientIdentity.as_str()).as_deref(),
        Some("1.2.3.4")
    );
}

// ==================== Login / Register ====================

#[tokio::test]
async fn test_login_success_sets_state_and_cookies() {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    let h = harness(&server);

    let auth = h
        .session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap();

    assert_eq!(auth.session_token, "T");
    assert!(h.session.is_logged_in());
    assert_eq!(h.session.session_token().as_deref(), Some("T"));
    assert_eq!(h.session.jwt().as_deref(), Some("J"));
    assert_eq!(h.cookies.get("token").as_deref(), Some("T"));
    assert_eq!(h.cookies.get("clientIpAddress").as_deref(), Some("id1"));
    assert_eq!(h.cookies.get("jwtToken").as_deref(), Some("J"));
}

#[tokio::test]
async fn test_login_failure_leaves_state_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "bad credentials" })),
        )
        .mount(&server)
        .await;
    let h = harness(&server);

    let err = h
        .session
        .login("a@b.com", "wrong", &ClientIdentity::from("id1"))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Unauthorized"), "{message}");
    assert!(message.contains("bad credentials"), "{message}");
    assert!(matches!(err, ApiError::Server { status: 401, .. }));

    assert!(!h.session.is_logged_in());
    assert!(h.storage.is_empty());
    assert!(h.cookies.writes().is_empty());
}

#[tokio::test]
async fn test_login_with_malformed_payload_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "T" })))
        .mount(&server)
        .await;
    let h = harness(&server);

    let err = h
        .session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::MalformedResponse(_)));
    assert!(h.storage.is_empty());
    assert!(h.cookies.writes().is_empty());
}

#[tokio::test]
async fn test_login_against_unreachable_backend_is_network_error() {
    init_tracing();
    let config = SessionConfig {
        api_url: "http://127.0.0.1:1".to_string(),
        ..SessionConfig::default()
    };
    let session = SessionManager::builder(config).build().unwrap();

    let err = session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn test_register_uses_register_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "RT",
            "jwtToken": "RJ",
            "clientIdentity": "id2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server);

    h.session
        .register("new@b.com", "pw", &ClientIdentity::from("id2"))
        .await
        .unwrap();

    assert!(h.session.is_logged_in());
    assert_eq!(h.cookies.get("token").as_deref(), Some("RT"));
    assert_eq!(h.cookies.get("clientIpAddress").as_deref(), Some("id2"));
}

#[tokio::test]
async fn test_login_adopts_identity_returned_by_server() {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    let h = harness(&server);
    h.storage.set(StorageKey::ClientIdentity.as_str(), "1.2.3.4");

    h.session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap();

    assert_eq!(h.session.client_identity(), Some(ClientIdentity::from("id1")));
    assert_eq!(
        h.storage.get(StorageKey::ClientIdentity.as_str()).as_deref(),
        Some("id1")
    );
    assert_eq!(h.cookies.get("clientIpAddress").as_deref(), Some("id1"));
}

#[tokio::test]
async fn test_login_without_returned_identity_keeps_sent_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "T",
            "jwtToken": "J"
        })))
        .mount(&server)
        .await;
    let h = harness(&server);
    h.storage.set(StorageKey::ClientIdentity.as_str(), "old");

    h.session
        .login("a@b.com", "pw", &ClientIdentity::from("sent"))
        .await
        .unwrap();

    assert_eq!(h.session.client_identity(), Some(ClientIdentity::from("sent")));
    assert_eq!(h.cookies.get("clientIpAddress").as_deref(), Some("sent"));
}

#[tokio::test]
async fn test_register_failure_leaves_state_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "error": "email taken" })))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server);

    let err = h
        .session
        .register("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap_err();

    match err {
        ApiError::Server { status, message, .. } => {
            assert_eq!(status, 409);
            assert_eq!(message, "email taken");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.session.auth_state(), AuthState::LoggedOut);
    assert!(h.storage.is_empty());
    assert!(h.cookies.writes().is_empty());
}

#[tokio::test]
async fn test_login_mirror_rides_on_outgoing_requests() {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .and(header_regex("cookie", r"(^|; )token=T(;|$)"))
        .and(header_regex("cookie", r"(^|; )jwtToken=J(;|$)"))
        .and(header_regex("cookie", r"(^|; )clientIpAddress=id1(;|$)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "1.2.3.4" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let jar = Arc::new(Jar::default());
    let client = AuthClient::with_cookie_jar(&config, jar.clone()).unwrap();
    let origin: Url = server.uri().parse().unwrap();
    let session = SessionManager::builder(config)
        .client(client.clone())
        .storage(Arc::new(MemoryStore::new()))
        .cookie_writer(Arc::new(ReqwestCookieWriter::new(jar, origin)))
        .build()
        .unwrap();

    session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap();

    assert_eq!(client.lookup_address().await.unwrap(), "1.2.3.4");
}

// ==================== Restart ====================

#[tokio::test]
async fn test_init_restores_mirror_from_stored_session() {
    let server = MockServer::start().await;
    mount_lookup(&server, ResponseTemplate::new(200), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    {
        let previous = FileStore::open(&file).unwrap();
        previous.set(StorageKey::ClientIdentity.as_str(), "id1");
        previous.set(StorageKey::SessionToken.as_str(), "T");
        previous.set(StorageKey::Jwt.as_str(), "J");
    }

    let config = config_for(&server);
    let jar = Arc::new(Jar::default());
    let origin: Url = server.uri().parse().unwrap();
    let session = SessionManager::builder(config.clone())
        .client(AuthClient::with_cookie_jar(&config, jar.clone()).unwrap())
        .storage(Arc::new(FileStore::open(&file).unwrap()))
        .cookie_writer(Arc::new(ReqwestCookieWriter::new(jar.clone(), origin.clone())))
        .build()
        .unwrap();
    assert!(jar.cookies(&origin).is_none());

    let identity = session.init().await;

    assert_eq!(identity, ClientIdentity::from("id1"));
    assert!(session.is_logged_in());
    let header = jar.cookies(&origin).unwrap();
    let header = header.to_str().unwrap();
    for expected in ["clientIpAddress=id1", "token=T", "jwtToken=J"] {
        assert!(header.split("; ").any(|c| c == expected), "{expected} missing from {header}");
    }
}

#[tokio::test]
async fn test_init_without_stored_session_writes_no_cookies() {
    let server = MockServer::start().await;
    let h = harness(&server);
    h.storage.set(StorageKey::ClientIdentity.as_str(), "id1");

    h.session.init().await;
    h.session.init().await;

    assert!(h.cookies.writes().is_empty());
}

// ==================== Logout ====================

#[tokio::test]
async fn test_logout_clears_everything_and_navigates_once() {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(body_json(json!({ "token": "T", "jwtToken": "J" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server);

    h.session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap();

    let handle = h.session.logout();

    // Local state is gone before the notification completes.
    assert_all_cleared(&h);

    handle.wait().await;
    assert_eq!(h.navigator.routes(), ["/"]);
}

#[tokio::test]
async fn test_logout_completes_when_backend_fails() {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server);

    h.session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap();
    h.session.logout().wait().await;

    assert_all_cleared(&h);
    assert_eq!(h.navigator.count(), 1);
}

#[tokio::test]
async fn test_logout_completes_when_backend_unreachable() {
    init_tracing();
    let config = SessionConfig {
        api_url: "http://127.0.0.1:1".to_string(),
        ..SessionConfig::default()
    };
    let storage = Arc::new(MemoryStore::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let session = SessionManager::builder(config)
        .storage(storage.clone())
        .navigator(navigator.clone())
        .build()
        .unwrap();
    storage.set(StorageKey::SessionToken.as_str(), "T");
    storage.set(StorageKey::Jwt.as_str(), "J");

    session.logout().wait().await;

    assert!(storage.is_empty());
    assert!(!session.is_logged_in());
    assert_eq!(navigator.count(), 1);
}

#[tokio::test]
async fn test_detached_logout_still_navigates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let h = harness(&server);

    drop(h.session.logout());

    h.navigator.wait_for(1).await;
    assert_eq!(h.navigator.count(), 1);
}

// ==================== Signal ====================

#[tokio::test]
async fn test_logout_signal_matches_direct_logout() {
    let server = MockServer::start().await;
    mount_lookup(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "ip": "id1" })),
        1,
    )
    .await;
    mount_login_success(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server);

    // Several components bootstrapping independently.
    for _ in 0..3 {
        h.session.init().await;
    }
    let identity = h.session.init().await;
    h.session.login("a@b.com", "pw", &identity).await.unwrap();
    assert!(h.session.is_logged_in());

    let delivered = h
        .bus
        .emit(&LogoutSignal::with_message("user menu"));

    assert_eq!(delivered, 1);
    assert_all_cleared(&h);

    h.navigator.wait_for(1).await;
    tokio::task::yield_now().await;
    assert_eq!(h.navigator.count(), 1);
}

#[tokio::test]
async fn test_signal_before_init_is_ignored() {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    let h = harness(&server);

    h.session
        .login("a@b.com", "pw", &ClientIdentity::from("id1"))
        .await
        .unwrap();

    assert_eq!(h.bus.emit(&LogoutSignal::default()), 0);
    assert!(h.session.is_logged_in());
    assert_eq!(h.navigator.count(), 0);
}
