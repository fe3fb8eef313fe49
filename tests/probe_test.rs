//! Integration tests for the probe chain using wiremock
//!
//! These tests run the real reqwest transport against a mock upstream and
//! check both the resolved status and the requests the probes send.

use instawatch::config::ProbeConfig;
use instawatch::models::TargetStatus;
use instawatch::probe::headers::{MOBILE_USER_AGENT, WEB_APP_ID};
use instawatch::probe::{HttpTransport, ReqwestTransport};
use instawatch::resolver::Resolver;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEB_PATH: &str = "/api/v1/users/web_profile_info/";
const APP_PATH: &str = "/i/api/v1/users/web_profile_info/";

fn probe_config(server: &MockServer) -> ProbeConfig {
    ProbeConfig {
        requests_per_second: 100,
        request_timeout_secs: 2,
        retry_base_delay_ms: 10,
        retry_step_ms: 10,
        ..ProbeConfig::default()
    }
    .with_base_url(&server.uri())
}

fn resolver(server: &MockServer) -> Resolver {
    Resolver::from_config(&probe_config(server)).expect("Failed to build resolver")
}

async fn requests_to(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

/// A user object in the first endpoint's payload settles it
#[tokio::test]
async fn test_structured_payload_with_user_is_active() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .and(query_param("username", "alice"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"data":{"user":{"id":"1","username":"alice"}},"status":"ok"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("@Alice").await;

    assert_eq!(resolution.status, TargetStatus::Active);
    assert_eq!(resolution.probe, Some("structured"));
    assert_eq!(requests_to(&server, APP_PATH).await, 0);
    assert_eq!(requests_to(&server, "/alice/").await, 0);
}

/// A null user means the account is gone
#[tokio::test]
async fn test_structured_null_user_is_deactivated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{"user":null}}"#))
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("ghost").await;
    assert_eq!(resolution.status, TargetStatus::Deactivated);
}

/// 404 from the first endpoint is definitive
#[tokio::test]
async fn test_structured_not_found_is_deactivated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("ghost").await;

    assert_eq!(resolution.status, TargetStatus::Deactivated);
    assert_eq!(requests_to(&server, APP_PATH).await, 0);
}

/// A blocked first variant falls through to the mobile one with its own headers
#[tokio::test]
async fn test_blocked_variant_falls_back_to_mobile_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(APP_PATH))
        .and(header("x-ig-app-id", WEB_APP_ID))
        .and(header("user-agent", MOBILE_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"user":{"id":"9"}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("alice").await;
    assert_eq!(resolution.status, TargetStatus::Active);
}

/// Non-JSON structured answers fall through to the profile page
#[tokio::test]
async fn test_markup_fallback_on_not_found_marker() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login wall</html>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(APP_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ghost/"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><h2>Sorry, this page isn't available.</h2></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("ghost").await;

    assert_eq!(resolution.status, TargetStatus::Deactivated);
    assert_eq!(resolution.probe, Some("markup"));
}

/// og:url pointing at the profile marks it active
#[tokio::test]
async fn test_markup_og_url_is_active() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(APP_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let page = r#"<!DOCTYPE html>
<html><head>
<meta property="og:url" content="https://www.instagram.com/alice/" />
<title>alice</title>
</head><body></body></html>"#;

    Mock::given(method("GET"))
        .and(path("/alice/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("alice").await;

    assert_eq!(resolution.status, TargetStatus::Active);
    assert_eq!(resolution.probe, Some("markup"));
}

/// A rate-limited structured probe stops resolution without touching the page
#[tokio::test]
async fn test_throttled_structured_probe_stops_chain() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("alice").await;

    assert_eq!(resolution.status, TargetStatus::Unknown);
    assert_eq!(requests_to(&server, APP_PATH).await, 0);
    assert_eq!(requests_to(&server, "/alice/").await, 0);
}

/// A page with no signal leaves the status unknown
#[tokio::test]
async fn test_page_without_signal_is_unknown() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEB_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(APP_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/alice/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve("alice").await;
    assert_eq!(resolution.status, TargetStatus::Unknown);
}

/// Transport reports the final status after following redirects
#[tokio::test]
async fn test_transport_follows_redirects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old/"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/new/", server.uri())),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::with_settings(100, Duration::from_secs(2)).unwrap();
    let response = transport
        .get(
            &format!("{}/old/", server.uri()),
            instawatch::probe::HeaderProfile::BrowserPage,
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "moved here");
}

/// An unreachable upstream never produces an error, only UNKNOWN
#[tokio::test]
async fn test_unreachable_upstream_is_unknown() {
    let config = ProbeConfig {
        requests_per_second: 100,
        request_timeout_secs: 1,
        retry_base_delay_ms: 1,
        retry_step_ms: 1,
        ..ProbeConfig::default()
    }
    .with_base_url("http://127.0.0.1:9");

    let resolver = Resolver::with_transport(
        Arc::new(ReqwestTransport::new(&config).unwrap()),
        &config,
    );

    let resolution = resolver.resolve("alice").await;
    assert_eq!(resolution.status, TargetStatus::Unknown);
}
