//! HTTP client construction and browser header emulation

use crate::error::ResolveError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Browser profiles for realistic header emulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserProfile {
    #[default]
    Chrome,
    Firefox,
    Safari,
    Android,
}

impl BrowserProfile {
    pub fn all() -> [BrowserProfile; 4] {
        [
            BrowserProfile::Chrome,
            BrowserProfile::Firefox,
            BrowserProfile::Safari,
            BrowserProfile::Android,
        ]
    }

    pub fn user_agent(&self) -> &'static str {
        match self {
            BrowserProfile::Chrome => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            BrowserProfile::Firefox => "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
            BrowserProfile::Safari => "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
            BrowserProfile::Android => "Mozilla/5.0 (Linux; Android 11; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        }
    }

    /// Client hints sent alongside the user agent
    fn hints(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            BrowserProfile::Chrome => &[
                ("sec-ch-ua", r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#),
                ("sec-ch-ua-mobile", "?0"),
                ("sec-ch-ua-platform", r#""Windows""#),
            ],
            BrowserProfile::Android => &[
                ("sec-ch-ua-mobile", "?1"),
                ("sec-ch-ua-platform", r#""Android""#),
            ],
            BrowserProfile::Firefox | BrowserProfile::Safari => &[],
        }
    }
}

impl FromStr for BrowserProfile {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserProfile::Chrome),
            "firefox" => Ok(BrowserProfile::Firefox),
            "safari" => Ok(BrowserProfile::Safari),
            "android" => Ok(BrowserProfile::Android),
            other => Err(ResolveError::Config(format!("unknown browser profile: {}", other))),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Per-hop request timeout
    #[serde(with = "crate::utils::duration")]
    pub timeout: Duration,
    /// Overrides the profile's user agent
    pub user_agent: Option<String>,
    pub proxy_url: Option<String>,
    pub profile: BrowserProfile,
    pub max_redirects: usize,
    /// Response bodies above this size are rejected
    pub max_body_bytes: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: None,
            proxy_url: None,
            profile: BrowserProfile::default(),
            max_redirects: 10,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

impl HttpClientConfig {
    pub fn effective_user_agent(&self) -> &str {
        self.user_agent
            .as_deref()
            .unwrap_or_else(|| self.profile.user_agent())
    }

    /// Default headers attached to every hop request
    pub fn default_headers(&self) -> Result<HeaderMap, ResolveError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(self.effective_user_agent())?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );
        for &(name, value) in self.profile.hints() {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        Ok(headers)
    }

    /// Build the shared connection pool
    pub fn build_client(&self) -> Result<Client, ResolveError> {
        let mut builder = ClientBuilder::new()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .redirect(Policy::limited(self.max_redirects))
            .default_headers(self.default_headers()?);

        if let Some(proxy_url) = &self.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ResolveError::Config(format!("invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        debug!(
            "Building HTTP client (timeout {:?}, redirects {}, profile {:?})",
            self.timeout, self.max_redirects, self.profile
        );

        builder
            .build()
            .map_err(|e| ResolveError::Config(format!("failed to build HTTP client: {}", e)))
    }
}

pub(crate) fn header_value(value: &str) -> Result<HeaderValue, ResolveError> {
    HeaderValue::from_str(value)
        .map_err(|_| ResolveError::Config(format!("invalid header value: {:?}", value)))
}
