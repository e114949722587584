//! Domain types for the Bynona storefront API.
//!
//! Only the fields the client acts on are modelled; everything else the API
//! returns is kept in an `extra` map so records survive a store round trip
//! unchanged.

use bynona_core::{BrandId, CategoryId, DiscountPercent, OfferId, Price, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Customer Types
// =============================================================================

/// Profile of a signed-in shopper.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// First and last name joined, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            self.email.clone().unwrap_or_default()
        } else {
            name
        }
    }
}

// =============================================================================
// Catalog Types
// =============================================================================

/// A product as listed by the catalog and search endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Undiscounted unit price in the store currency.
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Discount of the first offer, clamped to 0-100.
    #[must_use]
    pub fn discount_percent(&self) -> DiscountPercent {
        self.offers
            .first()
            .map_or(DiscountPercent::NONE, |offer| {
                DiscountPercent::clamped(offer.discount_percent)
            })
    }

    /// Whether the product is on offer.
    #[must_use]
    pub fn has_offer(&self) -> bool {
        !self.discount_percent().is_zero()
    }

    /// Listed price before any discount.
    #[must_use]
    pub fn base_price(&self) -> Price {
        Price::egp(self.price)
    }

    /// Price after the offer discount, rounded to two decimal places.
    #[must_use]
    pub fn final_price(&self) -> Price {
        self.base_price().discounted(self.discount_percent())
    }
}

/// A discount attached to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OfferId>,
    /// Percentage off the listed price. The API spells the field
    /// `disscount_price`.
    #[serde(rename = "disscount_price", default)]
    pub discount_percent: Decimal,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A product brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of search results. Replaces the previous page wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResultPage {
    pub items: Vec<Product>,
    /// 1-based page number this result is for.
    pub page: u32,
    /// Number of pages available for the query; at least 1.
    pub last_page: u32,
}

impl SearchResultPage {
    /// Whether a pager should be shown.
    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.last_page > 1
    }
}

/// Sort key the offers listing uses.
pub const SORT_OFFERS: &str = "offers";

/// Parameters of a product listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductFilter {
    /// Value of the `sort` query parameter, passed through verbatim.
    pub sort: Option<String>,
    /// 1-based page; `None` lets the API pick the first page.
    pub page: Option<u32>,
    pub brand: Option<BrandId>,
    pub category: Option<CategoryId>,
}

impl ProductFilter {
    /// The listing the offers page shows.
    #[must_use]
    pub fn offers() -> Self {
        Self {
            sort: Some(SORT_OFFERS.to_string()),
            page: Some(1),
            ..Self::default()
        }
    }
}

// =============================================================================
// Response Envelopes
// =============================================================================

/// Status fields shared by every API response.
///
/// The API signals success in several ways: `success: true`,
/// `status: "success"`, `status: true` or `status: 200`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    #[must_use]
    pub fn is_success(&self) -> bool {
        if self.success == Some(true) {
            return true;
        }
        match &self.status {
            Some(Value::String(status)) => status.eq_ignore_ascii_case("success"),
            Some(Value::Bool(status)) => *status,
            Some(Value::Number(code)) => code.as_u64() == Some(200),
            _ => false,
        }
    }
}

/// Response of the endpoints that may issue a session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthReply {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub reset_token: Option<String>,
}

// =============================================================================
// List Normalisation
// =============================================================================

/// Locate the item array in a list response.
///
/// Tried in order: `data.data`, `data.products`, `data`, `products`, then
/// the body itself. A body with none of these is an empty list.
#[must_use]
pub fn list_items(body: &Value) -> &[Value] {
    let data = body.get("data");
    [
        data.and_then(|d| d.get("data")),
        data.and_then(|d| d.get("products")),
        data,
        body.get("products"),
        Some(body),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_array)
    .map(Vec::as_slice)
    .unwrap_or_default()
}

/// Decode the items of a list response.
///
/// # Errors
///
/// Returns an error if an item does not match `T`.
pub fn decode_list<T: serde::de::DeserializeOwned>(body: &Value) -> Result<Vec<T>, serde_json::Error> {
    list_items(body)
        .iter()
        .map(|item| T::deserialize(item))
        .collect()
}

/// Decode a paginated search response for the given requested page.
///
/// # Errors
///
/// Returns an error if an item is not a valid product.
pub fn decode_search_page(body: &Value, requested_page: u32) -> Result<SearchResultPage, serde_json::Error> {
    let meta = body.get("data").filter(|d| d.is_object()).unwrap_or(body);
    let number = |key: &str| {
        meta.get(key)
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .and_then(|n| u32::try_from(n).ok())
    };

    let page = number("current_page").unwrap_or(requested_page).max(1);
    let last_page = number("last_page").unwrap_or(1).max(1);

    Ok(SearchResultPage {
        items: decode_list(body)?,
        page,
        last_page,
    })
}
