//! Core types for Bynona.
//!
//! This module provides type-safe wrappers for common storefront concepts.

pub mod email;
pub mod id;
pub mod locale;
pub mod price;

pub use email::{Email, EmailError};
pub use id::*;
pub use locale::{Locale, ParseLocaleError, ParsePriceModeError, PriceMode};
pub use price::{CurrencyCode, DiscountPercent, Price};
