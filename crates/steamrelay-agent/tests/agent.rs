//! Agent tests: config files in a temp dir, a local WebSocket gateway,
//! and a mocked Steam.

use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use steamrelay::ChannelError;
use steamrelay_agent::{Agent, AgentConfig, AgentError};
use steamrelay_session::SteamUrls;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type GatewaySocket = WebSocketStream<tokio::net::TcpStream>;

fn write_json(path: &Path, value: &Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// A config dir holding one account, alice, with saved cookies.
fn agent_dir(server_url: &str) -> (tempfile::TempDir, AgentConfig) {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("maFiles/alice.maFile"),
        &json!({
            "account_name": "alice",
            "shared_secret": "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=",
            "identity_secret": "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=",
            "Session": {"SteamID": "76561197960287930"}
        }),
    );
    write_json(
        &dir.path().join("accounts.json"),
        &json!({
            "alice": {
                "password": "hunter2",
                "mafile_path": "maFiles/alice.maFile",
                "api_key": "KEY",
                "login_cookies": {"sessionid": "sid-alice", "steamLoginSecure": "jwt"}
            }
        }),
    );
    let config = AgentConfig {
        server_url: server_url.to_owned(),
        agent_token: "agent-token".into(),
        mafiles_dir: dir.path().join("maFiles"),
        accounts_path: dir.path().join("accounts.json"),
        proxies_path: dir.path().join("proxies.json"),
        reconnect_delay_secs: 1,
        ..AgentConfig::default()
    };
    (dir, config)
}

/// Accepts agents forever, handing each socket and its index to `script`.
async fn gateway<F, Fut>(script: F) -> String
where
    F: Fn(usize, GatewaySocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut index = 0;
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            tokio::spawn(script(index, ws));
            index += 1;
        }
    });
    url
}

async fn next_json(ws: &mut GatewaySocket) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test]
async fn test_build_without_mafiles_is_no_accounts() {
    let (dir, config) = agent_dir("ws://127.0.0.1:1");
    std::fs::remove_dir_all(dir.path().join("maFiles")).unwrap();

    let err = Agent::build(config).await.err().unwrap();
    assert!(matches!(err, AgentError::NoAccounts(_)));
    assert!(dir.path().join("maFiles").is_dir());
}

#[tokio::test]
async fn test_build_without_token_is_missing_setting() {
    let (_dir, config) = agent_dir("ws://127.0.0.1:1");
    let config = AgentConfig {
        agent_token: String::new(),
        ..config
    };

    let err = Agent::build(config).await.err().unwrap();
    assert!(matches!(err, AgentError::MissingSetting("agent_token")));
}

#[tokio::test]
async fn test_build_announces_scanned_logins() {
    let (_dir, config) = agent_dir("ws://127.0.0.1:1");
    let agent = Agent::build(config).await.unwrap();
    assert_eq!(agent.logins(), ["alice"]);
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_run_once_returns_first_disconnect() {
    let url = gateway(|_, mut ws| async move {
        next_json(&mut ws).await;
        let _ = ws.close(None).await;
    })
    .await;
    let (_dir, config) = agent_dir(&url);
    let agent = Agent::build(config).await.unwrap();

    let err = agent.run(&CancellationToken::new(), true).await.unwrap_err();
    assert!(matches!(err, AgentError::Channel(ChannelError::Closed)));
}

#[tokio::test]
async fn test_run_once_unreachable_gateway_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);
    let (_dir, config) = agent_dir(&url);
    let agent = Agent::build(config).await.unwrap();

    let err = agent.run(&CancellationToken::new(), true).await.unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));
}

#[tokio::test]
async fn test_run_reconnects_and_resends_manifest() {
    let (manifests_tx, mut manifests) = mpsc::unbounded_channel();
    let url = gateway(move |index, mut ws| {
        let manifests_tx = manifests_tx.clone();
        async move {
            let _ = manifests_tx.send(next_json(&mut ws).await);
            if index == 0 {
                let _ = ws.close(None).await;
            } else {
                // Hold the second connection open until the agent leaves.
                while ws.next().await.is_some() {}
            }
        }
    })
    .await;
    let (_dir, config) = agent_dir(&url);
    let agent = Agent::build(config).await.unwrap();
    let shutdown = CancellationToken::new();

    let watcher = {
        let shutdown = shutdown.clone();
        async move {
            let first = manifests.recv().await.unwrap();
            let second = tokio::time::timeout(Duration::from_secs(5), manifests.recv())
                .await
                .unwrap()
                .unwrap();
            shutdown.cancel();
            (first, second)
        }
    };
    let (outcome, (first, second)) = tokio::join!(agent.run(&shutdown, false), watcher);

    outcome.unwrap();
    assert_eq!(first, json!({"type": "manifest", "logins": ["alice"]}));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_run_serves_command_with_saved_cookies() {
    let steam = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<span>Alice</span>"))
        .mount(&steam)
        .await;

    let (response_tx, mut responses) = mpsc::unbounded_channel();
    let url = gateway(move |_, mut ws| {
        let response_tx = response_tx.clone();
        async move {
            next_json(&mut ws).await;
            let command = json!({"cmd": "get_session_id", "account_login": "ALICE",
                                 "request_id": "r-1", "args": {}});
            ws.send(Message::Text(command.to_string().into())).await.unwrap();
            let _ = response_tx.send(next_json(&mut ws).await);
            while ws.next().await.is_some() {}
        }
    })
    .await;
    let (_dir, config) = agent_dir(&url);
    let agent = Agent::build_with_urls(config, SteamUrls::single(&steam.uri()))
        .await
        .unwrap();
    let shutdown = CancellationToken::new();

    let watcher = {
        let shutdown = shutdown.clone();
        async move {
            let response = responses.recv().await.unwrap();
            shutdown.cancel();
            response
        }
    };
    let (outcome, response) = tokio::join!(agent.run(&shutdown, false), watcher);

    outcome.unwrap();
    assert_eq!(response["request_id"], "r-1");
    assert_eq!(response["status"], "success");
    assert_eq!(response["result"], "sid-alice");
    assert!(agent.channel().dispatcher().sessions().is_empty().await);
}
