//! Cache types for catalog lookups.

use std::sync::Arc;

use bynona_core::{Locale, PriceMode};

use super::types::{Brand, Category};

/// Cache key for catalog lists.
///
/// Locale and price mode are part of the key because the API localises
/// names and prices per request; switching either simply misses the cache.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    pub path: &'static str,
    pub locale: Locale,
    pub price_mode: PriceMode,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Brands(Arc<[Brand]>),
    Categories(Arc<[Category]>),
}
