//! Session configuration.

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, Url, redirect};
use thiserror::Error;

/// Default `User-Agent` sent by sessions.
pub const DEFAULT_USER_AGENT: &str = concat!("rxfetch/", env!("CARGO_PKG_VERSION"));

/// Default maximum number of redirects followed.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid proxy URL {url}: {source}")]
    Proxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid header {name}: {reason}")]
    Header { name: String, reason: String },

    #[error("failed to build client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Configuration for a [`Session`](crate::Session).
///
/// # Examples
///
/// ```
/// use rxfetch::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::default()
///     .timeout(Duration::from_secs(30))
///     .header("X-Client", "example");
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// Total time allowed per request, including the body. `None` disables it.
    pub timeout: Option<Duration>,

    pub connect_timeout: Option<Duration>,

    pub user_agent: String,

    /// Headers sent with every request of the session.
    pub headers: Vec<(String, String)>,

    /// Proxies, routed by scheme: `https` proxies serve HTTPS traffic and all
    /// others serve plain HTTP.
    pub proxies: Vec<Url>,

    /// Redirects followed before giving up. `0` disables following.
    pub max_redirects: usize,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("proxies", &self.proxies)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Some(Duration::from_secs(30)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            proxies: Vec::new(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn proxy(mut self, url: Url) -> Self {
        self.proxies.push(url);
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub(crate) fn default_headers(&self) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::new();
        for (key, value) in &self.headers {
            let invalid = |reason: String| ConfigError::Header {
                name: key.clone(),
                reason,
            };
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            map.append(name, value);
        }
        Ok(map)
    }

    /// Build the underlying `reqwest` client.
    pub fn build(&self) -> Result<Client, ConfigError> {
        let mut cb = Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(self.default_headers()?)
            .redirect(if self.max_redirects == 0 {
                redirect::Policy::none()
            } else {
                redirect::Policy::limited(self.max_redirects)
            });

        if let Some(timeout) = self.timeout {
            cb = cb.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            cb = cb.connect_timeout(timeout);
        }

        let (secure, insecure): (Vec<&Url>, Vec<&Url>) =
            self.proxies.iter().partition(|u| u.scheme() == "https");

        for u in secure {
            cb = cb.proxy(Proxy::https(u.as_str()).map_err(|source| ConfigError::Proxy {
                url: u.to_string(),
                source,
            })?);
        }

        for u in insecure {
            cb = cb.proxy(Proxy::http(u.as_str()).map_err(|source| ConfigError::Proxy {
                url: u.to_string(),
                source,
            })?);
        }

        Ok(cb.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert!(config.user_agent.starts_with("rxfetch/"));
    }

    #[test]
    fn test_builder_chain() {
        let config = SessionConfig::default()
            .timeout(Duration::from_secs(5))
            .user_agent("test/1.0")
            .header("X-Token", "abc")
            .max_redirects(0);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.user_agent, "test/1.0");
        assert_eq!(config.headers, vec![("X-Token".to_string(), "abc".to_string())]);
        assert!(config.build().is_ok());
    }

    #[test]
    fn test_invalid_header_name() {
        let config = SessionConfig::default().header("bad header", "x");
        assert!(matches!(config.build(), Err(ConfigError::Header { .. })));
    }

    #[test]
    fn test_debug_hides_header_values() {
        let config = SessionConfig::default().header("Authorization", "Bearer secret");
        let debug = format!("{config:?}");
        assert!(debug.contains("Authorization"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_proxy_build() {
        let config = SessionConfig::default()
            .proxy(Url::parse("http://127.0.0.1:3128").unwrap())
            .proxy(Url::parse("https://127.0.0.1:3129").unwrap());
        assert!(config.build().is_ok());
    }
}
