use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT,
};
use serde::{Deserialize, Serialize};

/// Desktop browser user agent
pub const WEB_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Mobile browser user agent
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0 Mobile Safari/537.36";

/// Public web application id accepted by the profile info endpoint
pub const WEB_APP_ID: &str = "936619743392459";

/// Request identity a probe presents to the upstream service
///
/// Each structured endpoint variant is requested with a different profile so
/// that a block on one identity does not block every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderProfile {
    /// Desktop browser issuing an XHR for JSON
    WebJson,
    /// Mobile client identifying itself with the web app id
    MobileApp,
    /// Desktop browser navigating to an HTML page
    BrowserPage,
}

impl HeaderProfile {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebJson => "web_json",
            Self::MobileApp => "mobile_app",
            Self::BrowserPage => "browser_page",
        }
    }

    /// Build the header set for this profile
    ///
    /// # Examples
    ///
    /// ```
    /// use instawatch::probe::headers::HeaderProfile;
    /// use reqwest::header::USER_AGENT;
    ///
    /// let headers = HeaderProfile::MobileApp.headers();
    /// assert!(headers.contains_key(USER_AGENT));
    /// assert!(headers.contains_key("x-ig-app-id"));
    /// ```
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        match self {
            Self::WebJson => {
                headers.insert(USER_AGENT, HeaderValue::from_static(WEB_USER_AGENT));
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("application/json, text/plain, */*"),
                );
                headers.insert(
                    HeaderName::from_static("x-requested-with"),
                    HeaderValue::from_static("XMLHttpRequest"),
                );
            }
            Self::MobileApp => {
                headers.insert(USER_AGENT, HeaderValue::from_static(MOBILE_USER_AGENT));
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("application/json, text/plain, */*"),
                );
                headers.insert(
                    HeaderName::from_static("x-ig-app-id"),
                    HeaderValue::from_static(WEB_APP_ID),
                );
            }
            Self::BrowserPage => {
                headers.insert(USER_AGENT, HeaderValue::from_static(WEB_USER_AGENT));
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static(
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    ),
                );
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            }
        }

        headers
    }
}

impl std::fmt::Display for HeaderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_json_headers() {
        let headers = HeaderProfile::WebJson.headers();

        assert_eq!(headers.get(USER_AGENT).unwrap(), WEB_USER_AGENT);
        assert_eq!(headers.get("x-requested-with").unwrap(), "XMLHttpRequest");
        assert!(!headers.contains_key("x-ig-app-id"));
    }

    #[test]
    fn test_mobile_app_headers() {
        let headers = HeaderProfile::MobileApp.headers();

        assert_eq!(headers.get(USER_AGENT).unwrap(), MOBILE_USER_AGENT);
        assert_eq!(headers.get("x-ig-app-id").unwrap(), WEB_APP_ID);
    }

    #[test]
    fn test_browser_page_headers() {
        let headers = HeaderProfile::BrowserPage.headers();

        assert!(headers
            .get(ACCEPT)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.get(PRAGMA).unwrap(), "no-cache");
    }

    #[test]
    fn test_profiles_differ() {
        assert_ne!(
            HeaderProfile::WebJson.headers(),
            HeaderProfile::MobileApp.headers()
        );
    }

    #[test]
    fn test_profile_serde_names() {
        let json = serde_json::to_string(&HeaderProfile::MobileApp).unwrap();
        assert_eq!(json, "\"mobile_app\"");
    }
}
