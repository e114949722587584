//! Typed client for the Bynona storefront API.
//!
//! [`BynonaClient`] owns the gateway and exposes one method per endpoint the
//! storefront calls. Endpoint groups live in their own files as separate
//! `impl BynonaClient` blocks:
//!
//! - `auth` - login, logout, registration, OTP and password reset flows
//! - `catalog` - brands, categories, product listings, offers and search
//!
//! Brands and categories are cached for 5 minutes.

mod auth;
mod cache;
mod catalog;
pub mod types;

pub use auth::{Acknowledgement, AuthOutcome, PasswordReset, Registration};
pub use types::{
    Brand, Category, Envelope, Offer, Product, ProductFilter, SORT_OFFERS, SearchResultPage,
    UserProfile, decode_list, list_items,
};

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::{Gateway, ReqwestTransport, Transport};
use crate::preferences::Preferences;
use crate::storage::{FileStore, KeyValueStore, SessionEvent, SessionStore, StorageError};

use cache::{CacheKey, CacheValue};

const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 64;

// =============================================================================
// BynonaClient
// =============================================================================

/// Client for the Bynona storefront API.
///
/// Cloning is cheap; clones share the gateway, session and cache.
#[derive(Clone)]
pub struct BynonaClient {
    inner: Arc<BynonaClientInner>,
}

struct BynonaClientInner {
    gateway: Gateway,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for BynonaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BynonaClient")
            .field("gateway", &self.inner.gateway)
            .field("cached_entries", &self.inner.cache.entry_count())
            .finish()
    }
}

impl BynonaClient {
    /// Create a client over an existing gateway.
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(BynonaClientInner { gateway, cache }),
        }
    }

    /// Create a client with the file-backed store and HTTP transport the
    /// configuration describes.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` if the state file cannot be read, or
    /// `ApiError::NetworkUnreachable` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let store = Arc::new(FileStore::open(&config.state_path)?);
        let transport = Arc::new(
            ReqwestTransport::new(config.timeout).map_err(ApiError::NetworkUnreachable)?,
        );
        Self::with_parts(config, store, transport).map_err(ApiError::from)
    }

    /// Create a client over the given store and transport.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if stored preferences cannot be read.
    pub fn with_parts(
        config: &ClientConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, StorageError> {
        let preferences = Preferences::load(Arc::clone(&store), config.default_locale)?;
        let session = SessionStore::new(store);
        let gateway = Gateway::new(config.api_url.clone(), transport, session, preferences);
        Ok(Self::new(gateway))
    }

    /// The gateway every call goes through.
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.inner.gateway.session()
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        self.inner.gateway.preferences()
    }

    /// Receive session lifecycle events (sign-in, refresh, expiry, sign-out).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session().subscribe()
    }

    /// Whether an access token is stored.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` if the session cannot be read.
    pub fn is_authenticated(&self) -> Result<bool, ApiError> {
        Ok(self.session().access_token()?.is_some())
    }

    /// Profile stored at sign-in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` if the session cannot be read.
    pub fn current_user(&self) -> Result<Option<UserProfile>, ApiError> {
        Ok(self.session().user()?)
    }

    /// Drop every cached catalog list.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    fn cache_key(&self, path: &'static str) -> CacheKey {
        let preferences = self.preferences();
        CacheKey {
            path,
            locale: preferences.locale(),
            price_mode: preferences.price_mode(),
        }
    }
}
