//! Public configuration for the tutor backend client.

use std::time::Duration;

/// Environment variable overriding the backend base URL.
pub const API_URL_ENV: &str = "MAYA_API_URL";

/// Environment variable overriding the request timeout, in whole seconds.
pub const API_TIMEOUT_ENV: &str = "MAYA_API_TIMEOUT_SECS";

/// Configuration for [`ApiClient`](crate::ApiClient).
///
/// # Example
///
/// ```
/// use maya_http::ApiConfig;
/// use std::time::Duration;
///
/// let config = ApiConfig::new()
///     .with_base_url("http://192.168.1.16:8000")
///     .with_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend (scheme, host, port, optional path prefix).
    pub(crate) base_url: String,
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// Request timeout
    pub(crate) timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            user_agent: concat!("maya-http/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MAYA_API_URL` and `MAYA_API_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from an arbitrary source.
    ///
    /// Unparseable timeouts are ignored with a warning.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(API_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %raw, "Ignoring invalid {API_TIMEOUT_ENV}"),
            }
        }

        config
    }

    /// Set the backend base URL.
    ///
    /// Defaults to `http://localhost:8000`.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the user agent string for HTTP requests.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}
