// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Client configuration.
//!
//! A `ClientConfig` holds everything about a `Twython` client that isn't per-call: the credentials
//! it signs with, extra headers, the API version and base URL it targets, TLS and timeout
//! settings, and how dynamically-assembled parameters with unsupported values are treated.
//!
//! It's assembled with builder methods, starting from `ClientConfig::new` (or `Default`):
//!
//! ```rust
//! use std::time::Duration;
//! use twython::{ClientConfig, KeyPair, Token};
//!
//! let config = ClientConfig::new()
//!     .credentials(Token::App(KeyPair::new("consumer key", "consumer secret")))
//!     .user_agent("my-app/0.1")
//!     .timeout(Duration::from_secs(30));
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use hyper::header::{HeaderName, HeaderValue, USER_AGENT};

use crate::auth::Token;
use crate::common::{Headers, ParamPolicy};
use crate::error::{Error, Result};
use crate::links;

/// Which page users are sent to when authorizing an app with OAuth 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    /// `oauth/authenticate`, the "Sign in with Twitter" flow. Users who have already authorized
    /// the app are redirected back immediately.
    Authenticate,
    /// `oauth/authorize`, which always asks the user to approve the app.
    Authorize,
}

impl AuthEndpoint {
    pub(crate) fn path(self) -> &'static str {
        match self {
            AuthEndpoint::Authenticate => links::auth::AUTHENTICATE,
            AuthEndpoint::Authorize => links::auth::AUTHORIZE,
        }
    }
}

impl Default for AuthEndpoint {
    fn default() -> AuthEndpoint {
        AuthEndpoint::Authenticate
    }
}

/// Settings shared by every call a `Twython` client makes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The credentials used to sign requests.
    pub token: Token,
    /// Custom headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Proxy URLs keyed by URL scheme.
    pub proxies: BTreeMap<String, String>,
    /// The API version used for relative endpoints.
    pub api_version: Cow<'static, str>,
    /// The scheme and host relative endpoints are resolved against, without a trailing slash.
    pub base_url: Cow<'static, str>,
    /// Whether TLS certificates are verified.
    pub verify_tls: bool,
    /// The time limit for a whole call, if any.
    pub timeout: Option<Duration>,
    /// How JSON parameters with unsupported values are treated.
    pub param_policy: ParamPolicy,
    /// Which page `get_authentication_tokens` sends users to.
    pub auth_endpoint: AuthEndpoint,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            token: Token::None,
            headers: BTreeMap::new(),
            proxies: BTreeMap::new(),
            api_version: Cow::Borrowed(links::DEFAULT_API_VERSION),
            base_url: Cow::Borrowed(links::API_BASE),
            verify_tls: true,
            timeout: None,
            param_policy: ParamPolicy::default(),
            auth_endpoint: AuthEndpoint::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with no credentials and the default settings.
    pub fn new() -> ClientConfig {
        ClientConfig::default()
    }

    /// Sets the credentials used to sign requests.
    pub fn credentials(self, token: Token) -> ClientConfig {
        ClientConfig { token, ..self }
    }

    /// Adds a header sent with every request. Custom headers replace the defaults of the same
    /// name, compared case-insensitively.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> ClientConfig {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds several headers at once. See `header`.
    pub fn headers<I, K, V>(self, headers: I) -> ClientConfig
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |config, (name, value)| config.header(name, value))
    }

    /// Replaces the default `User-Agent` header.
    pub fn user_agent(self, user_agent: impl Into<String>) -> ClientConfig {
        self.header(USER_AGENT.as_str(), user_agent)
    }

    /// Routes requests for the given URL scheme through the given proxy.
    ///
    /// The bundled `HyperTransport` refuses configurations with proxies; these settings are for
    /// custom `Transport`s, which can read them back from the `proxies` field.
    pub fn proxy(mut self, scheme: impl Into<String>, proxy_url: impl Into<String>) -> ClientConfig {
        self.proxies.insert(scheme.into(), proxy_url.into());
        self
    }

    /// Sets the API version used for relative endpoints. Defaults to `1.1`.
    pub fn api_version(self, version: impl Into<Cow<'static, str>>) -> ClientConfig {
        ClientConfig {
            api_version: version.into(),
            ..self
        }
    }

    /// Sets the scheme and host relative endpoints are resolved against. Defaults to
    /// `https://api.twitter.com`.
    pub fn base_url(self, base_url: impl Into<Cow<'static, str>>) -> ClientConfig {
        let base_url = base_url.into();
        let base_url = match base_url.strip_suffix('/') {
            Some(trimmed) => Cow::Owned(trimmed.to_string()),
            None => base_url,
        };
        ClientConfig { base_url, ..self }
    }

    /// Sets whether TLS certificates are verified. Defaults to `true`.
    pub fn verify_tls(self, verify_tls: bool) -> ClientConfig {
        ClientConfig { verify_tls, ..self }
    }

    /// Sets how long a call may take, from sending the request to reading the last byte of the
    /// response. Unset by default.
    pub fn timeout(self, timeout: Duration) -> ClientConfig {
        ClientConfig {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Sets what happens to JSON parameters with values that can't be sent. Defaults to
    /// `ParamPolicy::Drop`.
    pub fn param_policy(self, param_policy: ParamPolicy) -> ClientConfig {
        ClientConfig {
            param_policy,
            ..self
        }
    }

    /// Sets which page `get_authentication_tokens` sends users to.
    pub fn auth_endpoint(self, auth_endpoint: AuthEndpoint) -> ClientConfig {
        ClientConfig {
            auth_endpoint,
            ..self
        }
    }

    /// Assembles the headers sent with every request: the default `User-Agent` with the custom
    /// headers merged over it.
    pub(crate) fn request_headers(&self) -> Result<Headers> {
        let mut headers = Headers::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("Twython-rs v", env!("CARGO_PKG_VERSION"))),
        );

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::Config(format!("invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::Config(format!("invalid value for header {}", name)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new();

        assert_eq!(config.api_version, "1.1");
        assert_eq!(config.base_url, "https://api.twitter.com");
        assert!(config.verify_tls);
        assert_eq!(config.timeout, None);
        assert_eq!(config.param_policy, ParamPolicy::Drop);

        let headers = config.request_headers().unwrap();
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("Twython-rs v"));
    }

    #[test]
    fn custom_headers_win() {
        let config = ClientConfig::new()
            .header("user-AGENT", "custom/1.0")
            .headers(vec![("X-Extra", "yes")]);
        let headers = config.request_headers().unwrap();

        assert_eq!(headers.get_all(USER_AGENT).iter().count(), 1);
        assert_eq!(headers[USER_AGENT], "custom/1.0");
        assert_eq!(headers["x-extra"], "yes");
    }

    #[test]
    fn invalid_header_is_config_error() {
        let config = ClientConfig::new().header("bad header", "x");
        assert!(matches!(config.request_headers(), Err(Error::Config(_))));
    }

    #[test]
    fn base_url_trailing_slash() {
        let config = ClientConfig::new().base_url("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
    }
}
