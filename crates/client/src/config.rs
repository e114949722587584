//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `BYNONA_API_URL` - API base URL (default: `https://bynona.store/api/v1`)
//! - `BYNONA_TIMEOUT_SECS` - Per-request timeout in seconds (default: 30)
//! - `BYNONA_SEARCH_DEBOUNCE_MS` - Search debounce window (default: 400)
//! - `BYNONA_SEARCH_MIN_CHARS` - Characters needed before searching (default: 2)
//! - `BYNONA_STATE_PATH` - Persisted client state file (default: `.bynona/state.json`)
//! - `BYNONA_DEFAULT_LOCALE` - Language used when none is stored (default: `ar`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use bynona_core::Locale;
use thiserror::Error;
use url::Url;

/// Production API origin.
pub const DEFAULT_API_URL: &str = "https://bynona.store/api/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEBOUNCE_MS: u64 = 400;
const DEFAULT_MIN_CHARS: usize = 2;
const DEFAULT_STATE_PATH: &str = ".bynona/state.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to
    pub api_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Search pipeline tuning
    pub search: SearchConfig,
    /// Where the file-backed key-value store lives
    pub state_path: PathBuf,
    /// Language used until the shopper picks one
    pub default_locale: Locale,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Debounce and threshold settings for the search pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a request is issued
    pub debounce: Duration,
    /// Minimum trimmed query length that triggers a search
    pub min_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at the given API base URL, everything else default.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            search: SearchConfig::default(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            default_locale: Locale::default(),
            sentry_dsn: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("BYNONA_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_base_url(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BYNONA_API_URL".to_string(), e))?;

        let timeout_secs: u64 =
            parse_or_default(&lookup, "BYNONA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BYNONA_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let debounce_ms: u64 =
            parse_or_default(&lookup, "BYNONA_SEARCH_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?;
        let min_chars: usize =
            parse_or_default(&lookup, "BYNONA_SEARCH_MIN_CHARS", DEFAULT_MIN_CHARS)?;

        let default_locale = match lookup("BYNONA_DEFAULT_LOCALE") {
            Some(value) => value.parse::<Locale>().map_err(|e| {
                ConfigError::InvalidEnvVar("BYNONA_DEFAULT_LOCALE".to_string(), e.to_string())
            })?,
            None => Locale::default(),
        };

        Ok(Self {
            api_url,
            timeout: Duration::from_secs(timeout_secs),
            search: SearchConfig {
                debounce: Duration::from_millis(debounce_ms),
                min_chars: min_chars.max(1),
            },
            state_path: lookup("BYNONA_STATE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_STATE_PATH), PathBuf::from),
            default_locale,
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.trim().is_empty()),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL and make sure joining relative paths keeps its last segment.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Parse a variable with `FromStr`, falling back to a default when unset.
fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
