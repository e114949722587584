//! Shopper preferences that travel on every request.
//!
//! The UI language and the price mode are read by the gateway at send time,
//! so a change made here shows up on the very next request.

use std::sync::{Arc, PoisonError, RwLock};

use bynona_core::{Locale, PriceMode};
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, LOCALE_KEY, PRICE_MODE_KEY, StorageError};

const PRICE_MODE_ENVELOPE_VERSION: u32 = 0;

/// Persisted price-mode entry, shaped like a versioned state-store snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct PriceModeEnvelope {
    state: PriceModeState,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModeState {
    price_mode: PriceMode,
}

#[derive(Debug, Clone, Copy)]
struct Current {
    locale: Locale,
    price_mode: PriceMode,
}

/// Locale and price mode, cached in memory and written through to storage.
///
/// Cloning is cheap; all clones share the same values.
#[derive(Clone)]
pub struct Preferences {
    current: Arc<RwLock<Current>>,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = *self.current.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Preferences")
            .field("locale", &current.locale)
            .field("price_mode", &current.price_mode)
            .finish_non_exhaustive()
    }
}

impl Preferences {
    /// Load stored preferences, using `default_locale` when no language is
    /// stored and retail pricing when no readable price mode is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn load(store: Arc<dyn KeyValueStore>, default_locale: Locale) -> Result<Self, StorageError> {
        let locale = match store.get(LOCALE_KEY)? {
            Some(tag) => tag.parse().unwrap_or_else(|_| {
                tracing::debug!(%tag, "Unsupported stored locale, using default");
                default_locale
            }),
            None => default_locale,
        };

        let price_mode = store
            .get(PRICE_MODE_KEY)?
            .and_then(|raw| serde_json::from_str::<PriceModeEnvelope>(&raw).ok())
            .map(|envelope| envelope.state.price_mode)
            .unwrap_or_default();

        Ok(Self {
            current: Arc::new(RwLock::new(Current { locale, price_mode })),
            store,
        })
    }

    /// Active UI language.
    #[must_use]
    pub fn locale(&self) -> Locale {
        self.read().locale
    }

    /// Active pricing mode.
    #[must_use]
    pub fn price_mode(&self) -> PriceMode {
        self.read().price_mode
    }

    /// Switch the UI language.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the new value cannot be persisted. The
    /// in-memory value is updated regardless.
    pub fn set_locale(&self, locale: Locale) -> Result<(), StorageError> {
        self.write().locale = locale;
        tracing::debug!(%locale, "Locale changed");
        self.store.set(LOCALE_KEY, locale.as_str())
    }

    /// Switch the pricing mode.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the new value cannot be encoded or
    /// persisted. The in-memory value is updated regardless.
    pub fn set_price_mode(&self, price_mode: PriceMode) -> Result<(), StorageError> {
        self.write().price_mode = price_mode;
        tracing::debug!(%price_mode, "Price mode changed");

        let envelope = PriceModeEnvelope {
            state: PriceModeState { price_mode },
            version: PRICE_MODE_ENVELOPE_VERSION,
        };
        let encoded = serde_json::to_string(&envelope).map_err(|source| StorageError::Encode {
            key: PRICE_MODE_KEY.to_string(),
            source,
        })?;
        self.store.set(PRICE_MODE_KEY, &encoded)
    }

    /// Flip between retail and wholesale pricing, returning the new mode.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the new value cannot be persisted.
    pub fn toggle_price_mode(&self) -> Result<PriceMode, StorageError> {
        let next = self.price_mode().toggled();
        self.set_price_mode(next)?;
        Ok(next)
    }

    fn read(&self) -> Current {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Current> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}
