//! Form bodies accepted by the web layer and the validated inputs they turn into.
//!
//! Raw forms are plain `Deserialize` structs with every field defaulted, so a
//! missing field becomes a validation error instead of an extractor rejection.
//! Handlers convert them with `TryFrom` before anything touches the store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, MESSAGE_MAX_CHARS};

pub const USERNAME_MAX_CHARS: usize = 30;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every field check that failed for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub errors: Vec<FieldError>,
}

impl FormErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FormErrors {}

// -- Raw forms --

/// Body of a mutation that carries nothing but the CSRF token.
#[derive(Debug, Default, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditProfileForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub header_image_url: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    /// Current password, re-checked before any change is applied.
    #[serde(default)]
    pub password: String,
}

/// `GET /users?q=...`
#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}

// -- Validated inputs --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: Option<String>,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl TryFrom<SignupForm> for NewUser {
    type Error = FormErrors;

    fn try_from(form: SignupForm) -> Result<Self, Self::Error> {
        let mut errors = FormErrors::default();
        let username = check_username(&mut errors, &form.username);
        let email = check_email(&mut errors, &form.email);

        if form.password.chars().count() < PASSWORD_MIN_CHARS {
            errors.push(
                "password",
                format!("Must be at least {PASSWORD_MIN_CHARS} characters."),
            );
        }

        errors.into_result(NewUser {
            username,
            password: form.password,
            email,
            image_url: or_default(&form.image_url, DEFAULT_IMAGE_URL),
        })
    }
}

impl TryFrom<LoginForm> for Credentials {
    type Error = FormErrors;

    fn try_from(form: LoginForm) -> Result<Self, Self::Error> {
        let mut errors = FormErrors::default();
        let username = form.username.trim().to_string();
        if username.is_empty() {
            errors.push("username", "This field is required.");
        }
        if form.password.is_empty() {
            errors.push("password", "This field is required.");
        }
        errors.into_result(Credentials {
            username,
            password: form.password,
        })
    }
}

impl TryFrom<MessageForm> for NewMessage {
    type Error = FormErrors;

    fn try_from(form: MessageForm) -> Result<Self, Self::Error> {
        let mut errors = FormErrors::default();
        let text = form.text.trim().to_string();
        if text.is_empty() {
            errors.push("text", "This field is required.");
        } else if text.chars().count() > MESSAGE_MAX_CHARS {
            errors.push(
                "text",
                format!("Must be at most {MESSAGE_MAX_CHARS} characters."),
            );
        }
        errors.into_result(NewMessage { text })
    }
}

impl TryFrom<&EditProfileForm> for ProfileUpdate {
    type Error = FormErrors;

    fn try_from(form: &EditProfileForm) -> Result<Self, Self::Error> {
        let mut errors = FormErrors::default();
        let username = check_username(&mut errors, &form.username);
        let email = check_email(&mut errors, &form.email);
        if form.password.is_empty() {
            errors.push("password", "This field is required.");
        }

        errors.into_result(ProfileUpdate {
            username,
            email,
            image_url: or_default(&form.image_url, DEFAULT_IMAGE_URL),
            header_image_url: or_default(&form.header_image_url, DEFAULT_HEADER_IMAGE_URL),
            bio: non_empty(&form.bio),
            location: non_empty(&form.location),
        })
    }
}

fn check_username(errors: &mut FormErrors, raw: &str) -> String {
    let username = raw.trim();
    if username.is_empty() {
        errors.push("username", "This field is required.");
    } else if username.chars().count() > USERNAME_MAX_CHARS {
        errors.push(
            "username",
            format!("Must be at most {USERNAME_MAX_CHARS} characters."),
        );
    } else if username.chars().any(char::is_whitespace) {
        errors.push("username", "Must not contain spaces.");
    }
    username.to_string()
}

fn check_email(errors: &mut FormErrors, raw: &str) -> Option<String> {
    let email = non_empty(raw)?;
    if !looks_like_email(&email) {
        errors.push("email", "Invalid email address.");
    }
    Some(email)
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn or_default(raw: &str, default: &str) -> String {
    non_empty(raw).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str, password: &str, email: &str) -> SignupForm {
        SignupForm {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_signup_defaults_image_and_optional_email() {
        let user = NewUser::try_from(signup(" u1 ", "password", "")).unwrap();
        assert_eq!(user.username, "u1");
        assert_eq!(user.email, None);
        assert_eq!(user.image_url, DEFAULT_IMAGE_URL);
    }

    #[test]
    fn test_signup_collects_every_error() {
        let errors = NewUser::try_from(signup("", "123", "not-an-email")).unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("password"));
        assert!(errors.has("email"));
        assert_eq!(errors.errors.len(), 3);
    }

    #[test]
    fn test_username_rules() {
        assert!(NewUser::try_from(signup("has space", "password", "")).is_err());
        let long = "x".repeat(USERNAME_MAX_CHARS + 1);
        assert!(NewUser::try_from(signup(&long, "password", "")).is_err());
        let max = "x".repeat(USERNAME_MAX_CHARS);
        assert!(NewUser::try_from(signup(&max, "password", "")).is_ok());
    }

    #[test]
    fn test_email_shapes() {
        assert!(looks_like_email("u1@email.com"));
        assert!(!looks_like_email("u1@email"));
        assert!(!looks_like_email("@email.com"));
        assert!(!looks_like_email("u1@@email.com"));
        assert!(!looks_like_email("u1@.com"));
    }

    #[test]
    fn test_message_length_is_counted_in_chars() {
        let ok = MessageForm {
            text: "é".repeat(MESSAGE_MAX_CHARS),
            ..Default::default()
        };
        assert!(NewMessage::try_from(ok).is_ok());

        let too_long = MessageForm {
            text: "a".repeat(MESSAGE_MAX_CHARS + 1),
            ..Default::default()
        };
        assert!(NewMessage::try_from(too_long).unwrap_err().has("text"));

        let blank = MessageForm {
            text: "   ".into(),
            ..Default::default()
        };
        assert!(NewMessage::try_from(blank).is_err());
    }

    #[test]
    fn test_profile_update_requires_password() {
        let form = EditProfileForm {
            username: "u1".into(),
            bio: "  hi  ".into(),
            ..Default::default()
        };
        let errors = ProfileUpdate::try_from(&form).unwrap_err();
        assert!(errors.has("password"));

        let form = EditProfileForm {
            password: "password".into(),
            ..form
        };
        let update = ProfileUpdate::try_from(&form).unwrap();
        assert_eq!(update.bio.as_deref(), Some("hi"));
        assert_eq!(update.location, None);
        assert_eq!(update.header_image_url, DEFAULT_HEADER_IMAGE_URL);
    }

    #[test]
    fn test_login_requires_both_fields() {
        let errors = Credentials::try_from(LoginForm::default()).unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("password"));
    }
}
