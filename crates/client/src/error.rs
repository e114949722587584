//! Error taxonomy for calls made through the gateway.
//!
//! Every endpoint method returns `Result<T, ApiError>`. Only an expired
//! access token is handled inside the gateway (refresh and retry once);
//! every other variant reaches the caller unchanged.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;

/// Message shown when the server could not be reached at all.
pub const NO_RESPONSE_MESSAGE: &str = "No response from server";

/// Fallback message when an error body carries no `message` field.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong";

/// Errors surfaced by the storefront API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The access token expired and could not be renewed: the retry was
    /// rejected again, or there was no refresh token to exchange.
    #[error("Session expired: {message}")]
    AuthExpired {
        /// Message from the rejected response.
        message: String,
    },

    /// The login endpoint rejected the email/password pair.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials {
        /// Message from the login response.
        message: String,
    },

    /// The refresh exchange itself failed. The session has been cleared.
    #[error("Session refresh failed: {0}")]
    RefreshFailed(#[source] RefreshFailure),

    /// No HTTP response was received.
    #[error("No response from server: {0}")]
    NetworkUnreachable(#[source] TransportError),

    /// The server rejected the request with a structured message.
    #[error("Request rejected ({status}): {message}")]
    ValidationRejected {
        /// HTTP status of the response.
        status: StatusCode,
        /// The `message` field of the error body.
        message: String,
        /// Per-field messages from the `errors` field, when present.
        errors: BTreeMap<String, Vec<String>>,
    },

    /// The server answered with an error status and no structured body.
    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// HTTP status of the response.
        status: StatusCode,
        /// Raw response body.
        body: String,
    },

    /// A successful response did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Persisted client state could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Whether the caller is now signed out and should route to the login entry point.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::AuthExpired { .. } | Self::RefreshFailed(_))
    }

    /// Text suitable for showing to the shopper.
    ///
    /// Server messages are passed through verbatim; transport details are
    /// replaced by a generic connectivity message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthExpired { message }
            | Self::InvalidCredentials { message }
            | Self::ValidationRejected { message, .. } => message.clone(),
            Self::NetworkUnreachable(_) => NO_RESPONSE_MESSAGE.to_string(),
            Self::RefreshFailed(_) => "Your session has ended, please sign in again".to_string(),
            Self::UnexpectedStatus { .. } | Self::Decode(_) | Self::Storage(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Why a refresh-token exchange failed.
///
/// Cloned to every request waiting on the same exchange.
#[derive(Debug, Clone, Error)]
pub enum RefreshFailure {
    /// No refresh token is stored for the session.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The refresh endpoint rejected the token.
    #[error("refresh token rejected ({status}): {message}")]
    Rejected {
        /// HTTP status of the refresh response.
        status: StatusCode,
        /// Message from the refresh response.
        message: String,
    },

    /// The refresh endpoint answered 2xx without a `token`.
    #[error("refresh response carried no token")]
    MissingToken,

    /// The refresh request never got a response.
    #[error("refresh request failed: {0}")]
    Transport(TransportError),

    /// The new token could not be persisted.
    #[error("could not persist refreshed token: {0}")]
    Storage(String),
}
