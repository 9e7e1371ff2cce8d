//! Credentials and client configuration.
//!
//! Every setting has a default so a client can be built from credentials
//! alone. `ClientConfig::from_env` overlays environment variables for
//! command-line use.

use std::fmt;
use std::time::Duration;

use crate::decode::ResponseFormat;

pub const DEFAULT_BASE_URL: &str = "https://api.pinboard.in/v1/";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of hex digits in an API token after the `user:` prefix.
const TOKEN_HEX_LEN: usize = 20;

/// How requests authenticate against the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Basic` header with username and password.
    Basic,
    /// The secret is sent as the `auth_token` query parameter.
    Token,
}

/// Username plus password or API token. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    secret: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            secret: secret.into(),
        }
    }

    /// Reads `PINBOARD_USER` and `PINBOARD_SECRET`.
    pub fn from_env() -> Option<Self> {
        let user = std::env::var("PINBOARD_USER").ok()?;
        let secret = std::env::var("PINBOARD_SECRET").ok()?;
        Some(Self::new(user, secret))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Token mode when the secret is `<user>:<20 hex digits>`, Basic otherwise.
    pub fn auth_mode(&self) -> AuthMode {
        let is_token = self
            .secret
            .strip_prefix(self.user.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .is_some_and(|hex| {
                hex.len() == TOKEN_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit())
            });
        if is_token {
            AuthMode::Token
        } else {
            AuthMode::Basic
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Transport and format settings for a `PinboardClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to.
    /// Env: `PINBOARD_API_URL`
    pub base_url: String,

    /// Env: `PINBOARD_CONNECT_TIMEOUT` (seconds)
    pub connect_timeout: Duration,

    /// Total time allowed for one request, body included.
    /// Env: `PINBOARD_REQUEST_TIMEOUT` (seconds)
    pub request_timeout: Duration,

    /// Env: `PINBOARD_FORMAT` (`json` or `xml`)
    pub format: ResponseFormat,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            format: ResponseFormat::Json,
            user_agent: format!("pinboard-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PINBOARD_API_URL") {
            config.base_url = url;
        }

        if let Some(timeout) = seconds_from_env("PINBOARD_CONNECT_TIMEOUT") {
            config.connect_timeout = timeout;
        }

        if let Some(timeout) = seconds_from_env("PINBOARD_REQUEST_TIMEOUT") {
            config.request_timeout = timeout;
        }

        if let Ok(format) = std::env::var("PINBOARD_FORMAT") {
            match format.parse::<ResponseFormat>() {
                Ok(parsed) => config.format = parsed,
                Err(()) => {
                    tracing::warn!(value = %format, "Invalid PINBOARD_FORMAT, using default");
                }
            }
        }

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    /// The base URL with exactly one trailing slash.
    pub(crate) fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url.trim_end_matches('/'))
    }
}

fn seconds_from_env(name: &str) -> Option<Duration> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            tracing::warn!(variable = name, value = %value, "Invalid timeout, using default");
            None
        }
    }
}
