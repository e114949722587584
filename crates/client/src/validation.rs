//! Client-side form checks run before anything is submitted.
//!
//! Each form reports at most one error per field, the first rule it breaks.
//! Forms that feed an endpoint convert into the typed request on success.

use std::collections::BTreeMap;
use std::fmt;

use bynona_core::Email;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::api::Registration;

const MIN_PASSWORD_CHARS: usize = 6;
const MIN_PHONE_DIGITS: usize = 10;

/// Why a single field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("This field is required")]
    Required,
    #[error("Invalid email address")]
    EmailInvalid,
    #[error("Must be at least {0} characters")]
    MinLength(usize),
    #[error("Invalid phone number")]
    PhoneInvalid,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Per-field errors from a rejected form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, FieldError>,
}

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {error}")?;
            first = false;
        }
        Ok(())
    }
}

impl ValidationErrors {
    /// Error reported for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<FieldError> {
        self.fields.get(field).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldError)> + '_ {
        self.fields.iter().map(|(field, error)| (*field, *error))
    }

    fn check(&mut self, field: &'static str, result: Result<(), FieldError>) {
        if let Err(error) = result {
            self.fields.entry(field).or_insert(error);
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

// =============================================================================
// Rules
// =============================================================================

fn required(value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        Err(FieldError::Required)
    } else {
        Ok(())
    }
}

fn email(value: &str) -> Result<Email, FieldError> {
    required(value)?;
    Email::parse(value).map_err(|_| FieldError::EmailInvalid)
}

fn password(value: &SecretString) -> Result<(), FieldError> {
    let value = value.expose_secret();
    required(value)?;
    if value.chars().count() < MIN_PASSWORD_CHARS {
        return Err(FieldError::MinLength(MIN_PASSWORD_CHARS));
    }
    Ok(())
}

fn confirmation(password: &SecretString, confirmation: &SecretString) -> Result<(), FieldError> {
    required(confirmation.expose_secret())?;
    if password.expose_secret() != confirmation.expose_secret() {
        return Err(FieldError::PasswordMismatch);
    }
    Ok(())
}

fn phone(value: &str) -> Result<(), FieldError> {
    let value = value.trim();
    required(value)?;
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::PhoneInvalid);
    }
    if value.len() < MIN_PHONE_DIGITS {
        return Err(FieldError::MinLength(MIN_PHONE_DIGITS));
    }
    Ok(())
}

const fn accepted(value: bool) -> Result<(), FieldError> {
    if value { Ok(()) } else { Err(FieldError::Required) }
}

// =============================================================================
// Forms
// =============================================================================

/// Sign-in form.
#[derive(Debug)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
    pub remember_me: bool,
}

impl LoginForm {
    /// Check the form, returning the parsed email on success.
    ///
    /// # Errors
    ///
    /// Returns the per-field errors if any rule is broken.
    pub fn validate(&self) -> Result<Email, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let parsed = email(&self.email);
        errors.check("email", parsed.as_ref().map(|_| ()).map_err(|e| *e));
        errors.check("password", password(&self.password));
        errors.check("remember_me", accepted(self.remember_me));

        match parsed {
            Ok(parsed) if errors.is_empty() => Ok(parsed),
            _ => Err(errors),
        }
    }
}

/// Account creation form.
#[derive(Debug)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: SecretString,
    pub password_confirmation: SecretString,
    pub terms: bool,
}

impl RegisterForm {
    /// Check the form and build the registration request.
    ///
    /// # Errors
    ///
    /// Returns the per-field errors if any rule is broken.
    pub fn into_registration(self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check("first_name", required(&self.first_name));
        errors.check("last_name", required(&self.last_name));
        let parsed = email(&self.email);
        errors.check("email", parsed.as_ref().map(|_| ()).map_err(|e| *e));
        errors.check("phone", phone(&self.phone));
        errors.check("password", password(&self.password));
        errors.check(
            "password_confirmation",
            confirmation(&self.password, &self.password_confirmation),
        );
        errors.check("terms", accepted(self.terms));

        let Ok(email) = parsed else {
            return Err(errors);
        };
        errors.finish(|| Registration {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email,
            phone: self.phone.trim().to_string(),
            password: self.password,
            password_confirmation: self.password_confirmation,
        })
    }
}

/// Newsletter subscription form.
#[derive(Debug, Clone)]
pub struct SubscriptionForm {
    pub email: String,
}

impl SubscriptionForm {
    /// # Errors
    ///
    /// Returns the per-field errors if the email is missing or malformed.
    pub fn validate(&self) -> Result<Email, ValidationErrors> {
        email(&self.email).map_err(|error| {
            let mut errors = ValidationErrors::default();
            errors.check("email", Err(error));
            errors
        })
    }
}

/// New-password step of the reset flow.
#[derive(Debug)]
pub struct ResetPasswordForm {
    pub password: SecretString,
    pub password_confirmation: SecretString,
}

impl ResetPasswordForm {
    /// # Errors
    ///
    /// Returns the per-field errors if any rule is broken.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check("password", password(&self.password));
        errors.check(
            "password_confirmation",
            confirmation(&self.password, &self.password_confirmation),
        );
        errors.finish(|| ())
    }
}
