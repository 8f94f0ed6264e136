//! Client configuration: backend location, transport settings and secrets.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Environment variable holding the backend base URL.
pub const BASE_URL_ENV: &str = "CASHFLOW_API_BASE_URL";

/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "CASHFLOW_API_TIMEOUT_SECS";

/// When set, system proxy settings are ignored.
pub const DISABLE_SYSTEM_PROXY_ENV: &str = "CASHFLOW_DISABLE_SYSTEM_PROXY";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// A secret string type for sensitive data like bearer tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Options for reaching the financial-reporting backend.
///
/// `base_url` is always stored normalized, ending in `/api`, so endpoint
/// paths such as `/ai/chat` can be appended directly.
///
/// # Example
/// ```rust
/// use cashflow_chat::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("https://reports.example.com/")
///     .with_timeout(Duration::from_secs(30));
///
/// assert_eq!(options.base_url(), "https://reports.example.com/api");
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    base_url: String,

    /// Request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Ignore system proxy settings (`HTTP_PROXY` and friends).
    pub no_proxy: bool,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ClientOptions {
    /// Create options for the given backend URL.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            timeout: None,
            proxy: None,
            no_proxy: false,
            extra_headers: None,
        }
    }

    /// Build options from `CASHFLOW_API_BASE_URL` and `CASHFLOW_API_TIMEOUT_SECS`.
    ///
    /// A missing base URL falls back to the local development backend.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut options = Self::new(base_url);

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!("{} must be a number of seconds, got {:?}", TIMEOUT_ENV, raw))
            })?;
            options.timeout = Some(Duration::from_secs(secs));
        }

        options.no_proxy = std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some();

        Ok(options)
    }

    /// Normalized base URL, ending in `/api`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path such as `/ai/chat`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Bypass any system proxy.
    pub fn with_no_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Strip trailing slashes and make sure the URL ends in `/api`.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{}/api", trimmed)
    }
}
