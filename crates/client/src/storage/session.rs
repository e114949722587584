//! Authentication session persisted in the key-value store.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;

use super::{KeyValueStore, REFRESH_TOKEN_KEY, StorageError, TOKEN_KEY, USER_KEY};
use crate::api::UserProfile;

const EVENT_CAPACITY: usize = 16;

/// Client-held authentication state.
///
/// Tokens are kept as [`SecretString`] so they never show up in `Debug`
/// output or logs.
#[derive(Debug, Default)]
pub struct Session {
    /// Bearer token attached to every request.
    pub access_token: Option<SecretString>,
    /// Token exchanged for a new access token when the current one expires.
    pub refresh_token: Option<SecretString>,
    /// Profile of the signed-in shopper.
    pub user: Option<UserProfile>,
}

impl Session {
    /// Whether an access token is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Session lifecycle notifications for the UI shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was created by login or registration verification.
    LoggedIn,
    /// The access token was replaced by a refresh exchange.
    TokenRefreshed,
    /// The session could not be renewed and was cleared. The shopper has to
    /// sign in again.
    Expired,
    /// The shopper signed out.
    LoggedOut,
}

/// Reads and writes the [`Session`] entries of a [`KeyValueStore`].
///
/// Every read goes to the backing store, so a token replaced by one clone is
/// immediately visible to all others.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Wrap a key-value backend.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    /// The underlying key-value backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Receive lifecycle events from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Read the whole session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn load(&self) -> Result<Session, StorageError> {
        Ok(Session {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            user: self.user()?,
        })
    }

    /// Write every field of `session`, removing the ones that are absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        self.write_secret(TOKEN_KEY, session.access_token.as_ref())?;
        self.write_secret(REFRESH_TOKEN_KEY, session.refresh_token.as_ref())?;
        match &session.user {
            Some(user) => self.set_user(user),
            None => self.store.remove(USER_KEY),
        }
    }

    /// Current access token, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn access_token(&self) -> Result<Option<SecretString>, StorageError> {
        self.read_secret(TOKEN_KEY)
    }

    /// Current refresh token, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn refresh_token(&self) -> Result<Option<SecretString>, StorageError> {
        self.read_secret(REFRESH_TOKEN_KEY)
    }

    /// Stored profile of the signed-in shopper.
    ///
    /// An entry that no longer parses is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn user(&self) -> Result<Option<UserProfile>, StorageError> {
        let Some(raw) = self.store.get(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable stored user profile");
                Ok(None)
            }
        }
    }

    /// Replace the stored profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be encoded or written.
    pub fn set_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(user).map_err(|source| StorageError::Encode {
            key: USER_KEY.to_string(),
            source,
        })?;
        self.store.set(USER_KEY, &encoded)
    }

    /// Store a freshly issued session and emit [`SessionEvent::LoggedIn`].
    ///
    /// A refresh token or profile left over from an earlier session is
    /// removed when the new one does not carry it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn establish(&self, session: &Session) -> Result<(), StorageError> {
        self.save(session)?;
        tracing::info!(user_id = ?session.user.as_ref().and_then(|u| u.id), "Session established");
        self.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Store the result of a refresh exchange and emit
    /// [`SessionEvent::TokenRefreshed`].
    ///
    /// The refresh token is only replaced when the exchange rotated it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn replace_tokens(
        &self,
        access_token: &SecretString,
        refresh_token: Option<&SecretString>,
    ) -> Result<(), StorageError> {
        self.store.set(TOKEN_KEY, access_token.expose_secret())?;
        if let Some(refresh_token) = refresh_token {
            self.store
                .set(REFRESH_TOKEN_KEY, refresh_token.expose_secret())?;
        }
        self.emit(SessionEvent::TokenRefreshed);
        Ok(())
    }

    /// Clear the session after an irrecoverable refresh failure and emit
    /// [`SessionEvent::Expired`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written. The event is
    /// emitted either way.
    pub fn expire(&self) -> Result<(), StorageError> {
        let cleared = self.clear();
        tracing::warn!("Session expired, sign-in required");
        self.emit(SessionEvent::Expired);
        cleared
    }

    /// Clear the session on sign-out and emit [`SessionEvent::LoggedOut`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written. The event is
    /// emitted either way.
    pub fn logout(&self) -> Result<(), StorageError> {
        let cleared = self.clear();
        tracing::info!("Session cleared on logout");
        self.emit(SessionEvent::LoggedOut);
        cleared
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.store
            .remove_all(&[TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn read_secret(&self, key: &str) -> Result<Option<SecretString>, StorageError> {
        Ok(self
            .store
            .get(key)?
            .filter(|value| !value.is_empty())
            .map(SecretString::from))
    }

    fn write_secret(&self, key: &str, value: Option<&SecretString>) -> Result<(), StorageError> {
        match value {
            Some(secret) => self.store.set(key, secret.expose_secret()),
            None => self.store.remove(key),
        }
    }
}
