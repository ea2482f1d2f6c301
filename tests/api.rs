//! Router tests: the REST API driven through `tower::ServiceExt::oneshot`
//! against a session with fake device and release collaborators.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use dtu_companion::api;
use dtu_companion::config::CompanionConfig;
use dtu_companion::device::{DeviceConnector, DeviceLink};
use dtu_companion::domain::{ConnectionState, Release, ResourceKey};
use dtu_companion::error::{ConnectionError, FetchError};
use dtu_companion::service::ReleaseApi;
use dtu_companion::session::CompanionSession;

const LIVEDATA: &str = r#"{
    "total": {"Power": {"v": 412.5, "u": "W", "d": 1}, "YieldDay": {"v": 1830, "u": "Wh", "d": 0}},
    "systemStatus": {"git_hash": "v24.2.12", "hostname": "OpenDTU-1A2B3C"},
    "inverters": []
}"#;

/// Connects once and replays a single live data message.
#[derive(Debug)]
struct FakeDtu {
    online: bool,
}

struct FakeLink {
    pending: Option<String>,
}

#[async_trait]
impl DeviceConnector for FakeDtu {
    async fn connect(&self) -> Result<Box<dyn DeviceLink>, ConnectionError> {
        if !self.online {
            return Err(ConnectionError::Handshake("connection refused".to_string()));
        }
        Ok(Box::new(FakeLink {
            pending: Some(LIVEDATA.to_string()),
        }))
    }

    fn endpoint(&self) -> &str {
        "ws://opendtu.local/livedata"
    }
}

#[async_trait]
impl DeviceLink for FakeLink {
    async fn next_message(&mut self) -> Option<Result<String, ConnectionError>> {
        match self.pending.take() {
            Some(message) => Some(Ok(message)),
            None => std::future::pending().await,
        }
    }

    async fn send(&mut self, _command: String) -> Result<(), ConnectionError> {
        Ok(())
    }
}

#[derive(Debug)]
enum FakeGithub {
    Releases,
    RateLimited,
}

fn release(id: u64, tag: &str, published: &str) -> Release {
    Release {
        id,
        tag_name: tag.to_string(),
        name: Some(tag.to_string()),
        published_at: published.parse().ok(),
        body: None,
        html_url: format!("https://github.com/tbnobody/OpenDTU/releases/tag/{tag}"),
        prerelease: false,
    }
}

#[async_trait]
impl ReleaseApi for FakeGithub {
    async fn list_releases(&self, key: ResourceKey) -> Result<Vec<Release>, FetchError> {
        match (self, key) {
            (Self::RateLimited, _) => Err(FetchError::RateLimited {
                retry_after_secs: Some(60),
            }),
            (Self::Releases, ResourceKey::Firmware) => Ok(vec![
                release(2, "v24.3.15", "2024-03-15T12:00:00Z"),
                release(1, "v24.2.12", "2024-02-12T12:00:00Z"),
            ]),
            (Self::Releases, ResourceKey::App) => Ok(Vec::new()),
        }
    }
}

struct Harness {
    session: CompanionSession,
    app: Router,
}

async fn harness(online: bool, github: FakeGithub, auth: bool) -> Harness {
    let Ok(config) = CompanionConfig::from_lookup(|key| {
        (auth && key == "DTU_AUTH").then(|| "YWRtaW46b3BlbmR0dQ==".to_string())
    }) else {
        panic!("config should load");
    };
    let session =
        CompanionSession::start_with(&config, Arc::new(FakeDtu { online }), Arc::new(github))
            .await;
    let app = Router::new()
        .merge(api::build_router())
        .with_state(session.state());
    Harness { session, app }
}

impl Harness {
    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("request should build");
        };
        let Ok(response) = self.app.clone().oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), 1 << 20).await else {
            panic!("body should be readable");
        };
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    async fn wait_for_telemetry(&self) {
        let state = self.session.state();
        for _ in 0..200 {
            if state.telemetry.revision() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("telemetry never arrived");
    }

    async fn shutdown(self) {
        self.session.shutdown().await;
    }
}

#[tokio::test]
async fn health_reports_version() {
    let h = harness(false, FakeGithub::Releases, false).await;
    let (status, body) = h.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    h.shutdown().await;
}

#[tokio::test]
async fn telemetry_is_merged_from_device() {
    let h = harness(true, FakeGithub::Releases, false).await;
    h.wait_for_telemetry().await;

    let (status, body) = h.get("/api/v1/telemetry").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 1);
    assert_eq!(body["connection"], "connected");
    assert_eq!(body["snapshot"]["total"]["Power"]["v"], 412.5);
    assert_eq!(body["snapshot"]["systemStatus"]["git_hash"], "v24.2.12");
    h.shutdown().await;
}

#[tokio::test]
async fn unknown_resource_is_rejected() {
    let h = harness(false, FakeGithub::Releases, false).await;
    let (status, body) = h.get("/api/v1/releases/bootloader").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
    h.shutdown().await;
}

#[tokio::test]
async fn refresh_then_list_and_advise() {
    let h = harness(true, FakeGithub::Releases, false).await;
    h.wait_for_telemetry().await;

    let (status, body) = h
        .request(Method::POST, "/api/v1/releases/firmware/refresh", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resource"], "firmware");
    assert_eq!(body["outcome"]["outcome"], "fetched");
    assert_eq!(body["outcome"]["count"], 2);

    let (status, body) = h.get("/api/v1/releases/firmware").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["installed_version"], "v24.2.12");
    assert_eq!(body["releases"][0]["badges"]["is_latest"], true);
    assert_eq!(body["releases"][1]["badges"]["is_installed"], true);
    assert_eq!(body["releases"][1]["badges"]["is_recommended_minimum"], true);

    let (status, body) = h.get("/api/v1/updates/firmware").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_new_version"], true);
    assert_eq!(body["latest_tag"], "v24.3.15");
    h.shutdown().await;
}

#[tokio::test]
async fn rate_limited_refresh_maps_to_429() {
    let h = harness(false, FakeGithub::RateLimited, false).await;
    let (status, body) = h
        .request(Method::POST, "/api/v1/releases/app/refresh", None)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], 5001);
    assert_eq!(body["error"]["details"], "retry after 60 s");

    let (_, body) = h.get("/api/v1/releases/app").await;
    assert_eq!(body["last_error"]["kind"], "rate_limited");
    assert_eq!(body["is_fetching"], false);
    h.shutdown().await;
}

#[tokio::test]
async fn firmware_selection_rules() {
    let h = harness(true, FakeGithub::Releases, true).await;
    h.wait_for_telemetry().await;
    h.request(Method::POST, "/api/v1/releases/firmware/refresh", None)
        .await;

    let (status, body) = h
        .request(
            Method::POST,
            "/api/v1/firmware/selection",
            Some(json!({"tag": "24.3.15"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tag"], "v24.3.15");
    assert_eq!(body["installed_version"], "v24.2.12");

    let (status, _) = h
        .request(
            Method::POST,
            "/api/v1/firmware/selection",
            Some(json!({"tag": "v24.2.12"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = h
        .request(
            Method::POST,
            "/api/v1/firmware/selection",
            Some(json!({"tag": "v1.0.0"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);
    h.shutdown().await;
}

#[tokio::test]
async fn selection_requires_device_credentials() {
    let h = harness(false, FakeGithub::Releases, false).await;
    h.request(Method::POST, "/api/v1/releases/firmware/refresh", None)
        .await;
    let (status, body) = h
        .request(
            Method::POST,
            "/api/v1/firmware/selection",
            Some(json!({"tag": "v24.3.15"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 2002);
    h.shutdown().await;
}

#[tokio::test]
async fn settings_update_is_partial() {
    let h = harness(false, FakeGithub::Releases, false).await;
    let (status, body) = h.get("/api/v1/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enable_app_updates"], true);

    let (status, body) = h
        .request(
            Method::PUT,
            "/api/v1/settings",
            Some(json!({"language": "de", "enable_app_updates": false})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "de");
    assert_eq!(body["enable_app_updates"], false);
    assert_eq!(body["theme"], "system");
    h.shutdown().await;
}

#[tokio::test]
async fn device_commands_need_a_live_link() {
    let offline = harness(false, FakeGithub::Releases, false).await;
    let (status, body) = offline
        .request(
            Method::POST,
            "/api/v1/device/commands",
            Some(json!({"command": "restart"})),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], 5003);
    offline.shutdown().await;

    let online = harness(true, FakeGithub::Releases, false).await;
    online.wait_for_telemetry().await;
    assert_eq!(
        online.session.state().telemetry.connection_state(),
        ConnectionState::Connected
    );
    let (status, _) = online
        .request(
            Method::POST,
            "/api/v1/device/commands",
            Some(json!({"command": "restart"})),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = online
        .request(
            Method::POST,
            "/api/v1/device/commands",
            Some(json!({"command": "  "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    online.shutdown().await;
}
