//! Markup probe against the public profile page
//!
//! Reached only when the structured probe could not decide. The page body is
//! scanned for a fixed, ordered signal set:
//!
//! 1. "not available" phrase markers
//! 2. `og:url` / canonical link naming the requested handle
//! 3. `al:android:url` / `al:ios:url` deep links naming the requested handle
//! 4. a login redirect whose `next` parameter points at `/<handle>/`
//!
//! Transport failures are retried with a short incremental delay.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::headers::HeaderProfile;
use super::transport::{HttpResponse, HttpTransport};
use super::{is_throttle_status, ProbeOutcome, ProbeStrategy};
use crate::config::ProbeConfig;
use crate::utils::retry::{with_retry, RetryConfig};

/// Lowercased phrases shown on a removed or missing profile
pub const NOT_FOUND_MARKERS: &[&str] = &[
    "sorry, this page isn't available",
    "the link you followed may be broken",
    "page may have been removed",
    "page not found",
];

static OG_URL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:url"]"#).expect("Invalid selector"));

static CANONICAL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="canonical"]"#).expect("Invalid selector"));

static DEEP_LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="al:android:url"], meta[property="al:ios:url"]"#)
        .expect("Invalid selector")
});

static PROFILE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:[a-z0-9-]+\.)?instagram\.com/([^/?#]+)/?")
        .expect("Invalid regex pattern")
});

static DEEP_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^instagram://user\?username=([^"'&]+)"#).expect("Invalid regex pattern")
});

/// Probe that fetches and scans the public profile page
pub struct MarkupProbe {
    transport: Arc<dyn HttpTransport>,
    url_template: String,
    retry: RetryConfig,
}

impl MarkupProbe {
    pub fn new(transport: Arc<dyn HttpTransport>, url_template: impl Into<String>) -> Self {
        Self {
            transport,
            url_template: url_template.into(),
            retry: RetryConfig::linear(1, 1000, 500),
        }
    }

    /// Build from probe settings
    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &ProbeConfig) -> Self {
        Self {
            transport,
            url_template: config.profile_url_template.clone(),
            retry: RetryConfig::linear(
                config.markup_retry_attempts,
                config.retry_base_delay_ms,
                config.retry_step_ms,
            ),
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, url: &str) -> Option<HttpResponse> {
        let transport = &self.transport;
        match with_retry(&self.retry, || transport.get(url, HeaderProfile::BrowserPage)).await {
            Ok(response) => Some(response),
            Err(e) => {
                debug!(url = %url, error = %e, "Profile page fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl ProbeStrategy for MarkupProbe {
    fn name(&self) -> &'static str {
        "markup"
    }

    async fn probe(&self, handle: &str) -> ProbeOutcome {
        let url = self.url_template.replace("{handle}", handle);

        match self.fetch(&url).await {
            Some(response) => classify_response(handle, response.status, &response.body),
            None => ProbeOutcome::indeterminate("markup fetch failed"),
        }
    }
}

/// Classify a profile page response
pub fn classify_response(handle: &str, status: u16, body: &str) -> ProbeOutcome {
    match status {
        404 | 410 => ProbeOutcome::deactivated(format!("markup {status}")),
        s if is_throttle_status(s) => ProbeOutcome::throttled(format!("markup {s} limited")),
        200..=299 => classify_markup(handle, body),
        s => ProbeOutcome::indeterminate(format!("markup {s} unexpected")),
    }
}

/// Scan a successful page body for the known signals, in priority order
pub fn classify_markup(handle: &str, body: &str) -> ProbeOutcome {
    let handle = handle.to_lowercase();
    let lowered = body.to_lowercase();

    if NOT_FOUND_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ProbeOutcome::deactivated("markup not-available marker");
    }

    let document = Html::parse_document(body);

    let profile_link = document
        .select(&OG_URL_SELECTOR)
        .filter_map(|el| el.value().attr("content"))
        .chain(
            document
                .select(&CANONICAL_SELECTOR)
                .filter_map(|el| el.value().attr("href")),
        )
        .filter_map(|url| capture_handle(&PROFILE_URL_RE, url))
        .any(|found| found == handle);
    if profile_link {
        return ProbeOutcome::active("markup og:url/canonical match");
    }

    let deep_link = document
        .select(&DEEP_LINK_SELECTOR)
        .filter_map(|el| el.value().attr("content"))
        .filter_map(|url| capture_handle(&DEEP_LINK_RE, url))
        .any(|found| found == handle);
    if deep_link {
        return ProbeOutcome::active("markup deep-link match");
    }

    if login_redirect_names(&lowered, &handle) {
        return ProbeOutcome::active("markup login next=/handle/");
    }

    ProbeOutcome::indeterminate("markup has no reliable markers")
}

fn capture_handle(re: &Regex, value: &str) -> Option<String> {
    re.captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Login wall redirecting back to `/<handle>/`, plain or percent-encoded
fn login_redirect_names(lowered: &str, handle: &str) -> bool {
    let pattern = format!(
        r#"/accounts/login/\?next=(?:/|%2f){}(?:/|%2f|["'&\s]|$)"#,
        regex::escape(handle)
    );

    match Regex::new(&pattern) {
        Ok(re) => re.is_match(lowered),
        Err(e) => {
            debug!(handle = %handle, error = %e, "Login pattern rejected");
            false
        }
    }
}
