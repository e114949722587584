//! Bynona Core - Shared types library.
//!
//! This crate provides common types used across all Bynona components:
//! - `client` - HTTP gateway, endpoint clients and the search pipeline
//! - `cli` - Command-line shell over the client
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, locales and price modes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
