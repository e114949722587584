//! Request context preferences: UI language and pricing mode.
//!
//! Both values travel on every API request as headers, so each type knows
//! its own wire representation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a locale tag is not one the storefront supports.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported locale '{0}' (expected 'ar' or 'en')")]
pub struct ParseLocaleError(pub String);

/// Error returned when a price mode string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported price mode '{0}' (expected 'retail' or 'wholesale')")]
pub struct ParsePriceModeError(pub String);

/// Storefront UI language.
///
/// Arabic is the fallback language of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ar,
    En,
}

impl Locale {
    /// Value sent in the `Accept-Language` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ar => "ar",
            Self::En => "en",
        }
    }

    /// Whether text in this locale is laid out right-to-left.
    #[must_use]
    pub const fn is_rtl(self) -> bool {
        matches!(self, Self::Ar)
    }

    /// The other supported language (the language toggle).
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Ar => Self::En,
            Self::En => Self::Ar,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = ParseLocaleError;

    /// Accepts bare tags and region-qualified tags (`en-US` → `en`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "ar" => Ok(Self::Ar),
            "en" => Ok(Self::En),
            _ => Err(ParseLocaleError(s.to_string())),
        }
    }
}

/// Pricing context selected by the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    #[default]
    Retail,
    Wholesale,
}

impl PriceMode {
    /// Value sent in the `Price-Mode` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Wholesale => "wholesale",
        }
    }

    /// The other pricing mode (the price-mode toggle).
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Retail => Self::Wholesale,
            Self::Wholesale => Self::Retail,
        }
    }
}

impl fmt::Display for PriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceMode {
    type Err = ParsePriceModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retail" => Ok(Self::Retail),
            "wholesale" => Ok(Self::Wholesale),
            _ => Err(ParsePriceModeError(s.to_string())),
        }
    }
}
