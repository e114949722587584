//! Bynona storefront client library.
//!
//! Everything the storefront needs to talk to the Bynona API:
//!
//! - [`gateway`] - session-aware request pipeline with single-flight token refresh
//! - [`api`] - typed endpoint methods on [`BynonaClient`]
//! - [`search`] - debounced, paginated search-as-you-type
//! - [`storage`] - persisted session and preferences
//! - [`validation`] - client-side form checks

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod preferences;
pub mod search;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use api::BynonaClient;
pub use config::{ClientConfig, ConfigError, SearchConfig};
pub use error::{ApiError, RefreshFailure, TransportError};
pub use gateway::{ApiRequest, Gateway};
pub use preferences::Preferences;
pub use search::{SearchPipeline, SearchSnapshot, SearchSource, SearchStatus};
pub use storage::{KeyValueStore, Session, SessionEvent, SessionStore};
