use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Window within which a submitted transaction is expected to become visible;
/// the default attempt budget is derived from it.
const CONFIRMATION_WINDOW: Duration = Duration::from_secs(30);
const DEFAULT_KEY_TTL: time::Duration = time::Duration::days(14);

fn derived_attempts(poll_interval: Duration) -> u32 {
    let interval_ms = poll_interval.as_millis().max(1);
    (CONFIRMATION_WINDOW.as_millis() / interval_ms).max(1) as u32
}

/// DeFi Giving client configuration.
///
/// Required fields are constructor parameters — no runtime "missing field" errors.
///
/// ```rust,ignore
/// use giving_keyless::Config;
///
/// let config = Config::new(
///     "my-client-id",
///     "https://my-app.com".parse()?,
///     "https://my-app.com".parse()?,
/// );
/// // Optional overrides via chaining:
/// let config = config.with_poll_interval(std::time::Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    pub(crate) client_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) api_base: Url,
    pub(crate) auth_url: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) poll_interval: Duration,
    pub(crate) max_attempts: u32,
    pub(crate) key_ttl: time::Duration,
}

impl Config {
    /// Create a new configuration.
    ///
    /// `api_base` is the origin serving the app API (`/api/verify`,
    /// `/api/demo/reset`, `/api/chain/bootstrap-vault`).
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: Url, api_base: Url) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri,
            api_base,
            auth_url: DEFAULT_AUTH_URL.parse().expect("valid default URL"),
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: derived_attempts(DEFAULT_POLL_INTERVAL),
            key_ttl: DEFAULT_KEY_TTL,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Required env vars
    /// - `GIVING_CLIENT_ID`: OAuth2 client ID
    /// - `GIVING_REDIRECT_URI`: login callback URI (must be a valid URL)
    /// - `GIVING_API_BASE`: origin serving the app API
    ///
    /// # Optional env vars
    /// - `GIVING_AUTH_URL`: override the identity-provider authorize endpoint
    /// - `GIVING_SCOPES`: comma-separated OAuth2 scopes
    /// - `GIVING_POLL_INTERVAL_MS`: verification poll interval in milliseconds
    /// - `GIVING_MAX_ATTEMPTS`: verification attempt budget
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let client_id = std::env::var("GIVING_CLIENT_ID")
            .map_err(|_| Error::Config("GIVING_CLIENT_ID is required".into()))?;
        let redirect_uri: Url = std::env::var("GIVING_REDIRECT_URI")
            .map_err(|_| Error::Config("GIVING_REDIRECT_URI is required".into()))?
            .parse()
            .map_err(|e| Error::Config(format!("GIVING_REDIRECT_URI: {e}")))?;
        let api_base: Url = std::env::var("GIVING_API_BASE")
            .map_err(|_| Error::Config("GIVING_API_BASE is required".into()))?
            .parse()
            .map_err(|e| Error::Config(format!("GIVING_API_BASE: {e}")))?;

        let mut config = Self::new(client_id, redirect_uri, api_base);

        if let Ok(url_str) = std::env::var("GIVING_AUTH_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| Error::Config(format!("GIVING_AUTH_URL: {e}")))?;
            config = config.with_auth_url(url);
        }
        if let Ok(scopes) = std::env::var("GIVING_SCOPES") {
            config = config.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }
        if let Ok(interval) = std::env::var("GIVING_POLL_INTERVAL_MS") {
            let ms: u64 = interval
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    Error::Config("GIVING_POLL_INTERVAL_MS must be a positive integer".into())
                })?;
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if let Ok(attempts) = std::env::var("GIVING_MAX_ATTEMPTS") {
            let n: u32 = attempts
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::Config("GIVING_MAX_ATTEMPTS must be a positive integer".into())
                })?;
            config = config.with_max_attempts(n);
        }

        Ok(config)
    }

    /// Override the identity-provider authorize endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the OAuth2 scopes (default: `["openid", "email", "profile"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the verification poll interval.
    ///
    /// Also re-derives the attempt budget from the 30 s confirmation window;
    /// call [`with_max_attempts`](Self::with_max_attempts) afterwards to pin it.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self.max_attempts = derived_attempts(interval);
        self
    }

    /// Override the verification attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Override the lifetime of generated ephemeral key material.
    #[must_use]
    pub fn with_key_ttl(mut self, ttl: time::Duration) -> Self {
        self.key_ttl = ttl;
        self
    }

    /// OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Login callback URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Origin serving the app API.
    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Identity-provider authorize endpoint.
    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Requested OAuth2 scopes.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Verification poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Verification attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Lifetime of generated ephemeral key material.
    #[must_use]
    pub fn key_ttl(&self) -> time::Duration {
        self.key_ttl
    }
}
