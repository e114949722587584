//! Catalog endpoints: brands, categories, product listings and search.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, instrument};

use super::BynonaClient;
use super::cache::CacheValue;
use super::types::{
    Brand, Category, Product, ProductFilter, SearchResultPage, decode_list, decode_search_page,
};
use crate::error::ApiError;
use crate::gateway::ApiRequest;
use crate::search::SearchSource;

const BRANDS_PATH: &str = "/brands";
const CATEGORIES_PATH: &str = "/categories";

impl BynonaClient {
    /// All brands, in the active locale.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or an item is malformed.
    #[instrument(skip(self))]
    pub async fn brands(&self) -> Result<Arc<[Brand]>, ApiError> {
        let key = self.cache_key(BRANDS_PATH);
        if let Some(CacheValue::Brands(brands)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for brands");
            return Ok(brands);
        }

        let body: Value = self.gateway().send(ApiRequest::get(BRANDS_PATH)).await?;
        let brands: Arc<[Brand]> = decode_list(&body)?.into();

        self.inner
            .cache
            .insert(key, CacheValue::Brands(Arc::clone(&brands)))
            .await;

        Ok(brands)
    }

    /// All categories, in the active locale.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or an item is malformed.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<[Category]>, ApiError> {
        let key = self.cache_key(CATEGORIES_PATH);
        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let body: Value = self.gateway().send(ApiRequest::get(CATEGORIES_PATH)).await?;
        let categories: Arc<[Category]> = decode_list(&body)?.into();

        self.inner
            .cache
            .insert(key, CacheValue::Categories(Arc::clone(&categories)))
            .await;

        Ok(categories)
    }

    /// Products matching a filter. Prices follow the active price mode.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or an item is malformed.
    #[instrument(skip(self))]
    pub async fn filter_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ApiError> {
        let mut request = ApiRequest::get("/filter/product");
        if let Some(sort) = &filter.sort {
            request = request.query("sort", sort);
        }
        if let Some(page) = filter.page {
            request = request.query("page", page);
        }
        if let Some(brand) = filter.brand {
            request = request.query("brand_id", brand);
        }
        if let Some(category) = filter.category {
            request = request.query("category_id", category);
        }

        let body: Value = self.gateway().send(request).await?;
        Ok(decode_list(&body)?)
    }

    /// Products currently on offer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or an item is malformed.
    pub async fn offers(&self) -> Result<Vec<Product>, ApiError> {
        self.filter_products(&ProductFilter::offers()).await
    }

    /// One page of free-text search results.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or an item is malformed.
    #[instrument(skip(self))]
    pub async fn search(&self, text: &str, page: u32) -> Result<SearchResultPage, ApiError> {
        let page = page.max(1);
        let body: Value = self
            .gateway()
            .send(
                ApiRequest::get("/search")
                    .query("search", text.trim())
                    .query("page", page),
            )
            .await?;

        Ok(decode_search_page(&body, page)?)
    }
}

impl SearchSource for BynonaClient {
    fn fetch_page(&self, text: String, page: u32) -> BoxFuture<'_, Result<SearchResultPage, ApiError>> {
        async move { self.search(&text, page).await }.boxed()
    }
}
