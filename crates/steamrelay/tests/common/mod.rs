//! Shared fixture: a mocked Steam with two accounts that resume from
//! saved cookies, so no test goes through the login protocol.

#![allow(dead_code)]

use std::sync::Arc;

use steamrelay::{CommandDispatcher, RetryPolicy};
use steamrelay_market::ListingPaging;
use steamrelay_protocol::{CommandEnvelope, RequestId};
use steamrelay_session::{
    AccountRecord, CookieSnapshot, GuardSecrets, MemoryCredentialStore, NoProxy, SessionCache,
    SessionCacheConfig, SteamBackend, SteamUrls,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub type TestDispatcher = CommandDispatcher<SteamBackend<NoProxy>, MemoryCredentialStore>;

pub fn record(steamid: &str, sessionid: &str) -> AccountRecord {
    AccountRecord {
        password: Some("hunter2".into()),
        secrets: Some(GuardSecrets {
            steamid: steamid.into(),
            shared_secret: "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".into(),
            identity_secret: "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".into(),
        }),
        api_key: Some("KEY".into()),
        cookies: Some(CookieSnapshot::from([
            ("sessionid".to_owned(), sessionid.to_owned()),
            ("steamLoginSecure".to_owned(), "jwt".to_owned()),
        ])),
    }
}

/// Community root that reads as logged in for both alice and bob.
pub async fn mount_logged_in_root(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<span>Alice</span><span>Bob</span>"),
        )
        .mount(server)
        .await;
}

pub async fn store() -> Arc<MemoryCredentialStore> {
    let store = MemoryCredentialStore::new();
    store.insert("alice", record("76561197960287930", "sid-alice")).await;
    store.insert("bob", record("76561197960287931", "sid-bob")).await;
    Arc::new(store)
}

pub fn dispatcher_with(
    server: &MockServer,
    store: Arc<MemoryCredentialStore>,
    retry: RetryPolicy,
) -> TestDispatcher {
    let cache = SessionCache::new(
        SteamBackend::new(SteamUrls::single(&server.uri()), NoProxy),
        store,
        SessionCacheConfig::default(),
    );
    CommandDispatcher::new(cache, ListingPaging::unpaced(), retry)
}

pub async fn dispatcher(server: &MockServer) -> TestDispatcher {
    dispatcher_with(server, store().await, fast_retry())
}

/// Five attempts, millisecond pauses.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        backoff_unit: std::time::Duration::from_millis(5),
    }
}

pub fn envelope(id: &str, cmd: &str, login: &str, args: serde_json::Value) -> CommandEnvelope {
    CommandEnvelope {
        cmd: cmd.into(),
        account_login: login.into(),
        args,
        request_id: RequestId::from(id),
    }
}
