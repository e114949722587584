//! Command implementations.

use bynona_client::ApiError;
use bynona_client::storage::StorageError;
use bynona_client::validation::ValidationErrors;
use thiserror::Error;

pub mod auth;
pub mod catalog;
pub mod preferences;
pub mod search_live;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Could not update local state: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Could not read input: {0}")]
    Io(#[from] std::io::Error),
}
