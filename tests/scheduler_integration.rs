//! End-to-end tests: mock upstream, SQLite store, mock webhook
//!
//! The monitor is assembled the same way the binary does it, with every
//! outside service replaced by a wiremock server.

use instawatch::config::{ProbeConfig, ScheduleConfig};
use instawatch::error::Error;
use instawatch::models::TargetStatus;
use instawatch::notifications::{SharedNotifier, WebhookConfig, WebhookNotifier};
use instawatch::resolver::Resolver;
use instawatch::scheduler::Monitor;
use instawatch::storage::{SharedTargetRepository, SqliteTargetRepository, TargetRepository};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEB_PATH: &str = "/api/v1/users/web_profile_info/";

struct Harness {
    _dir: TempDir,
    db_path: std::path::PathBuf,
    upstream: MockServer,
    hooks: MockServer,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("targets.db");
        Self {
            _dir: dir,
            db_path,
            upstream: MockServer::start().await,
            hooks: MockServer::start().await,
        }
    }

    fn store(&self) -> SharedTargetRepository {
        Arc::new(SqliteTargetRepository::new(&self.db_path).unwrap())
    }

    fn monitor_with_tick(&self, tick_unit: Duration) -> Monitor {
        let probe = ProbeConfig {
            requests_per_second: 100,
            request_timeout_secs: 2,
            retry_base_delay_ms: 1,
            retry_step_ms: 1,
            ..ProbeConfig::default()
        }
        .with_base_url(&self.upstream.uri());

        let notifier: SharedNotifier = Arc::new(
            WebhookNotifier::new(
                WebhookConfig::new(format!("{}/notify", self.hooks.uri())).with_max_retries(0),
            )
            .unwrap(),
        );

        Monitor::with_tick_unit(
            self.store(),
            Resolver::from_config(&probe).unwrap(),
            notifier,
            ScheduleConfig::default(),
            tick_unit,
        )
    }

    fn monitor(&self) -> Monitor {
        self.monitor_with_tick(Duration::from_secs(60))
    }

    async fn upstream_answers(&self, body: &str) {
        self.upstream.reset().await;
        Mock::given(method("GET"))
            .and(path(WEB_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.upstream)
            .await;
    }

    async fn upstream_throttles(&self) {
        self.upstream.reset().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&self.upstream)
            .await;
    }

    async fn accept_hooks(&self) {
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.hooks)
            .await;
    }

    async fn hook_texts(&self) -> Vec<String> {
        self.hooks
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).ok())
            .filter_map(|v| v["text"].as_str().map(str::to_string))
            .collect()
    }
}

const ACTIVE: &str = r#"{"data":{"user":{"id":"1"}}}"#;
const GONE: &str = r#"{"data":{"user":null}}"#;

#[tokio::test]
async fn test_register_check_and_notify() {
    let h = Harness::new().await;
    h.accept_hooks().await;
    h.upstream_answers(ACTIVE).await;

    let monitor = h.monitor();
    let status = monitor.register_or_update_target(10, "@alice").await.unwrap();
    assert_eq!(status, TargetStatus::Active);
    assert!(h.hook_texts().await.is_empty());

    h.upstream_answers(GONE).await;
    let outcome = monitor.manual_check(10).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.status, TargetStatus::Deactivated);

    let texts = h.hook_texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("<b>alice</b>"));
    assert!(texts[0].contains("DEACTIVATED"));

    let again = monitor.manual_check(10).await.unwrap();
    assert!(!again.changed);
    assert_eq!(h.hook_texts().await.len(), 1);

    monitor.shutdown();
}

#[tokio::test]
async fn test_throttled_checks_count_errors_in_sqlite() {
    let h = Harness::new().await;
    h.accept_hooks().await;
    h.upstream_answers(ACTIVE).await;

    let monitor = h.monitor();
    monitor.register_or_update_target(5, "alice").await.unwrap();

    h.upstream_throttles().await;
    for _ in 0..3 {
        let outcome = monitor.manual_check(5).await.unwrap();
        assert_eq!(outcome.status, TargetStatus::Unknown);
    }
    monitor.shutdown();

    let record = h.store().get(5).unwrap().unwrap();
    assert_eq!(record.consecutive_errors, 3);
    assert_eq!(record.last_known_status, TargetStatus::Active);
    assert!(h.hook_texts().await.is_empty());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let h = Harness::new().await;
    h.accept_hooks().await;
    h.upstream_answers(GONE).await;

    {
        let monitor = h.monitor();
        monitor.register_or_update_target(1, "ghost").await.unwrap();
        monitor.set_interval(1, 2).await.unwrap();
        monitor.set_interval(2, 90).await.unwrap();
        monitor.shutdown();
    }

    let monitor = h.monitor();
    assert_eq!(monitor.start().await.unwrap(), 1);

    let snapshot = monitor.current_status(1).unwrap().unwrap();
    assert_eq!(snapshot.handle, "ghost");
    assert_eq!(snapshot.status, TargetStatus::Deactivated);
    assert_eq!(snapshot.interval_minutes, 5);

    assert!(monitor.current_status(2).unwrap().is_none());
    assert_eq!(monitor.list_targets().unwrap().len(), 2);
    monitor.shutdown();
}

#[tokio::test]
async fn test_reset_keeps_interval_and_stops_checks() {
    let h = Harness::new().await;
    h.accept_hooks().await;
    h.upstream_answers(ACTIVE).await;

    let monitor = h.monitor();
    monitor.register_or_update_target(3, "alice").await.unwrap();
    monitor.set_interval(3, 45).await.unwrap();
    monitor.clear_target(3).await.unwrap();

    assert!(!monitor.is_scheduled(3));
    assert!(monitor.current_status(3).unwrap().is_none());

    let err = monitor.manual_check(3).await.unwrap_err();
    assert!(matches!(err, Error::Scheduler(_)));

    let record = h.store().get(3).unwrap().unwrap();
    assert_eq!(record.interval_minutes, 45);
    assert_eq!(record.last_known_status, TargetStatus::Unknown);
}

#[tokio::test]
async fn test_timer_drives_checks() {
    let h = Harness::new().await;
    h.accept_hooks().await;
    h.upstream_answers(ACTIVE).await;

    let monitor = h.monitor_with_tick(Duration::from_millis(20));
    monitor.register_or_update_target(8, "alice").await.unwrap();
    monitor.set_interval(8, 5).await.unwrap();

    h.upstream_answers(GONE).await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    monitor.shutdown();

    let record = h.store().get(8).unwrap().unwrap();
    assert_eq!(record.last_known_status, TargetStatus::Deactivated);
    assert_eq!(h.hook_texts().await.len(), 1);
}

#[tokio::test]
async fn test_broadcast_reaches_every_owner() {
    let h = Harness::new().await;
    h.accept_hooks().await;
    h.upstream_answers(ACTIVE).await;

    let monitor = h.monitor();
    monitor.register_or_update_target(1, "alice").await.unwrap();
    monitor.register_or_update_target(2, "bob").await.unwrap();
    monitor.set_interval(3, 30).await.unwrap();

    let delivered = monitor.broadcast("maintenance tonight").await.unwrap();
    monitor.shutdown();

    assert_eq!(delivered, 3);
    let texts = h.hook_texts().await;
    assert_eq!(texts.len(), 3);
    assert!(texts.iter().all(|t| t == "maintenance tonight"));
}
