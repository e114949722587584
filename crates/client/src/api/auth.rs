//! Authentication endpoints.

use bynona_core::Email;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::instrument;

use super::BynonaClient;
use super::types::{AuthReply, Envelope, UserProfile};
use crate::error::{ApiError, GENERIC_FAILURE_MESSAGE};
use crate::gateway::ApiRequest;
use crate::storage::Session;

/// Result of a call that issues a session.
#[derive(Debug, Clone, Default)]
pub struct AuthOutcome {
    /// Server confirmation message.
    pub message: Option<String>,
    /// Profile returned alongside the tokens.
    pub user: Option<UserProfile>,
    /// Whether a session was stored.
    pub signed_in: bool,
}

/// Result of a call that only reports success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acknowledgement {
    pub message: Option<String>,
}

/// Account creation form.
#[derive(Debug)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: String,
    pub password: SecretString,
    pub password_confirmation: SecretString,
}

/// Final step of the password reset flow.
#[derive(Debug)]
pub struct PasswordReset {
    pub email: Email,
    /// Token returned by [`BynonaClient::verify_reset_otp`].
    pub reset_token: SecretString,
    pub password: SecretString,
    pub password_confirmation: SecretString,
}

impl BynonaClient {
    /// Sign in and store the issued session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidCredentials` if the email/password pair is
    /// rejected, or `ApiError::ValidationRejected` if the API reports
    /// failure or issues no token.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<AuthOutcome, ApiError> {
        let reply: AuthReply = self
            .gateway()
            .send(ApiRequest::post("/login").json(json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            })))
            .await?;

        ensure_success(&reply.envelope)?;
        if reply.token.as_deref().is_none_or(str::is_empty) {
            return Err(not_successful(Some(
                "Login response carried no token".to_string(),
            )));
        }

        self.store_session(reply)
    }

    /// Sign out. The server call is best effort; the local session is
    /// cleared whatever its outcome.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` only if the session could not be cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Err(e) = self
            .gateway()
            .send::<serde_json::Value>(ApiRequest::post("/logout"))
            .await
        {
            tracing::warn!(error = %e, "Logout request failed, clearing session anyway");
        }

        self.invalidate_cache();
        Ok(self.session().logout()?)
    }

    /// Create an account. The API then sends a one-time code to the email.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationRejected` with the server's message if
    /// the registration is refused.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<Acknowledgement, ApiError> {
        let envelope: Envelope = self
            .gateway()
            .send(ApiRequest::post("/register").json(json!({
                "first_name": registration.first_name,
                "last_name": registration.last_name,
                "email": registration.email.as_str(),
                "phone": registration.phone,
                "password": registration.password.expose_secret(),
                "password_confirmation": registration.password_confirmation.expose_secret(),
            })))
            .await?;

        acknowledge(envelope)
    }

    /// Confirm a registration with the emailed code. When the response
    /// carries a token the shopper is signed in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationRejected` if the code is refused.
    #[instrument(skip(self, otp), fields(email = %email))]
    pub async fn verify_otp(&self, email: &Email, otp: &str) -> Result<AuthOutcome, ApiError> {
        let reply: AuthReply = self
            .gateway()
            .send(ApiRequest::post("/verify-otp").json(json!({
                "email": email.as_str(),
                "otp": otp.trim(),
            })))
            .await?;

        ensure_success(&reply.envelope)?;
        if reply.token.as_deref().is_none_or(str::is_empty) {
            return Ok(AuthOutcome {
                message: reply.envelope.message,
                user: reply.user,
                signed_in: false,
            });
        }

        self.store_session(reply)
    }

    /// Send a new registration code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationRejected` if the request is refused.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn resend_otp(&self, email: &Email) -> Result<Acknowledgement, ApiError> {
        self.email_only("/resend-otp", email).await
    }

    /// Start the password reset flow by emailing a code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationRejected` if the request is refused.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn send_reset_email(&self, email: &Email) -> Result<Acknowledgement, ApiError> {
        self.email_only("/sendEmail", email).await
    }

    /// Send a new password reset code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationRejected` if the request is refused.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn resend_reset_otp(&self, email: &Email) -> Result<Acknowledgement, ApiError> {
        self.email_only("/forgotPassword/resend-otp", email).await
    }

    /// Exchange the emailed reset code for a reset token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationRejected` if the code is refused or no
    /// reset token is returned.
    #[instrument(skip(self, otp), fields(email = %email))]
    pub async fn verify_reset_otp(&self, email: &Email, otp: &str) -> Result<SecretString, ApiError> {
        let reply: AuthReply = self
            .gateway()
            .send(ApiRequest::post("/sendCode").json(json!({
                "email": email.as_str(),
                "otp": otp.trim(),
            })))
            .await?;

        ensure_success(&reply.envelope)?;
        reply
            .reset_token
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| not_successful(reply.envelope.message))
    }

    /// Set a new password with a verified reset token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationRejected` if the reset is refused.
    #[instrument(skip(self, reset), fields(email = %reset.email))]
    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<Acknowledgement, ApiError> {
        let envelope: Envelope = self
            .gateway()
            .send(ApiRequest::post("/password").json(json!({
                "email": reset.email.as_str(),
                "reset_token": reset.reset_token.expose_secret(),
                "password": reset.password.expose_secret(),
                "password_confirmation": reset.password_confirmation.expose_secret(),
            })))
            .await?;

        acknowledge(envelope)
    }

    async fn email_only(&self, path: &str, email: &Email) -> Result<Acknowledgement, ApiError> {
        let envelope: Envelope = self
            .gateway()
            .send(ApiRequest::post(path).json(json!({ "email": email.as_str() })))
            .await?;

        acknowledge(envelope)
    }

    fn store_session(&self, reply: AuthReply) -> Result<AuthOutcome, ApiError> {
        let session = Session {
            access_token: reply.token.map(SecretString::from),
            refresh_token: reply
                .refresh_token
                .filter(|token| !token.is_empty())
                .map(SecretString::from),
            user: reply.user.clone(),
        };
        self.session().establish(&session)?;
        self.invalidate_cache();

        Ok(AuthOutcome {
            message: reply.envelope.message,
            user: reply.user,
            signed_in: true,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Error for a 2xx response whose body reports failure.
fn not_successful(message: Option<String>) -> ApiError {
    ApiError::ValidationRejected {
        status: StatusCode::OK,
        message: message.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
        errors: std::collections::BTreeMap::new(),
    }
}

fn ensure_success(envelope: &Envelope) -> Result<(), ApiError> {
    if envelope.is_success() {
        Ok(())
    } else {
        Err(not_successful(envelope.message.clone()))
    }
}

fn acknowledge(envelope: Envelope) -> Result<Acknowledgement, ApiError> {
    ensure_success(&envelope)?;
    Ok(Acknowledgement {
        message: envelope.message,
    })
}
