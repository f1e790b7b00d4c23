//! Signup, login, and create-repository forms.
//!
//! Validation never fails with an error value; it produces a [`FieldErrors`]
//! set holding one message per offending field plus a general banner.
//! Submitting an invalid form returns those errors without contacting the
//! account service.

use std::hash::Hash;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::identity::{AccountService, Session};
use crate::views::Route;

pub const GENERAL_ERROR: &str = "Please fix the errors below before continuing.";

pub const USERNAME_ERROR: &str = "Username must be at least 4 characters.";
pub const EMAIL_ERROR: &str = "Email address is invalid.";
pub const PASSWORD_ERROR: &str =
    "Password must be at least 8 characters and include both letters and numbers.";
pub const COUNTRY_ERROR: &str = "Please select your country/region.";

pub const IDENTIFIER_ERROR: &str = "Username or Email must be at least 4 characters.";
pub const LOGIN_PASSWORD_ERROR: &str = "Password must be at least 8 characters.";

pub const REPO_NAME_ERROR: &str = "Repository Name is required!";

/// Country choices; the first entry is the unselected placeholder.
pub const COUNTRIES: [&str; 7] = [
    "Select",
    "Philippines",
    "USA",
    "Canada",
    "UK",
    "Australia",
    "Other",
];

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid"));

// ────────────────────────────────────────────────────────────────────────────
// FieldErrors
// ────────────────────────────────────────────────────────────────────────────

/// Validation messages keyed by field, in the order the checks ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors<F: Hash + Eq> {
    fields: IndexMap<F, String>,
    general: Option<String>,
}

impl<F: Hash + Eq> Default for FieldErrors<F> {
    fn default() -> Self {
        Self {
            fields: IndexMap::new(),
            general: None,
        }
    }
}

impl<F: Hash + Eq + Copy> FieldErrors<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: F, message: impl Into<String>) {
        self.fields.insert(field, message.into());
    }

    pub fn get(&self, field: F) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn general(&self) -> Option<&str> {
        self.general.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.general.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, &str)> {
        self.fields.iter().map(|(f, m)| (*f, m.as_str()))
    }

    /// Drop the message for `field` and the general banner, as happens when
    /// the user edits that field.
    pub fn clear(&mut self, field: F) {
        self.fields.shift_remove(&field);
        self.general = None;
    }

    fn finish(mut self) -> Self {
        if !self.fields.is_empty() {
            self.general = Some(GENERAL_ERROR.to_string());
        }
        self
    }
}

async fn submit_with<F, T, Fut>(
    errors: FieldErrors<F>,
    call: impl FnOnce() -> Fut,
) -> Result<T, SubmitError<F>>
where
    F: Hash + Eq + Copy + std::fmt::Debug,
    Fut: std::future::Future<Output = Result<T, crate::error::IdentityError>>,
{
    if !errors.is_empty() {
        return Err(SubmitError::Invalid(errors));
    }
    Ok(call().await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Signup
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignupField {
    Username,
    Email,
    Password,
    Country,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub country: String,
}

impl Default for SignupForm {
    fn default() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            password: String::new(),
            country: COUNTRIES[0].to_string(),
        }
    }
}

/// At least eight ASCII letters or digits, with at least one of each.
pub fn is_valid_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().all(|c| c.is_ascii_alphanumeric())
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

impl SignupForm {
    pub fn validate(&self) -> FieldErrors<SignupField> {
        let mut errors = FieldErrors::new();
        if self.username.chars().count() < 4 {
            errors.insert(SignupField::Username, USERNAME_ERROR);
        }
        if !is_valid_email(&self.email) {
            errors.insert(SignupField::Email, EMAIL_ERROR);
        }
        if !is_valid_password(&self.password) {
            errors.insert(SignupField::Password, PASSWORD_ERROR);
        }
        if self.country == COUNTRIES[0] {
            errors.insert(SignupField::Country, COUNTRY_ERROR);
        }
        errors.finish()
    }

    pub fn set(&mut self, field: SignupField, value: impl Into<String>) {
        let value = value.into();
        match field {
            SignupField::Username => self.username = value,
            SignupField::Email => self.email = value,
            SignupField::Password => self.password = value,
            SignupField::Country => self.country = value,
        }
    }

    /// Validate, then register through `service`.
    pub async fn submit(
        &self,
        service: &dyn AccountService,
    ) -> Result<Session, SubmitError<SignupField>> {
        let session = submit_with(self.validate(), || {
            service.register(&self.username, &self.email, &self.password)
        })
        .await?;
        tracing::info!(principal = %session.principal, "Signup successful");
        Ok(session)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Login
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginField {
    Identifier,
    Password,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> FieldErrors<LoginField> {
        let mut errors = FieldErrors::new();
        if self.identifier.chars().count() < 4 {
            errors.insert(LoginField::Identifier, IDENTIFIER_ERROR);
        }
        if self.password.chars().count() < 8 {
            errors.insert(LoginField::Password, LOGIN_PASSWORD_ERROR);
        }
        errors.finish()
    }

    pub fn set(&mut self, field: LoginField, value: impl Into<String>) {
        let value = value.into();
        match field {
            LoginField::Identifier => self.identifier = value,
            LoginField::Password => self.password = value,
        }
    }

    pub async fn submit(
        &self,
        service: &dyn AccountService,
    ) -> Result<Session, SubmitError<LoginField>> {
        let session = submit_with(self.validate(), || {
            service.sign_in(&self.identifier, &self.password)
        })
        .await?;
        tracing::info!(principal = %session.principal, "Login successful");
        Ok(session)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Create repository
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    #[default]
    Write,
    Admin,
}

impl std::str::FromStr for AccessLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            "admin" => Ok(AccessLevel::Admin),
            _ => anyhow::bail!("Invalid access level '{}'. Valid values: read, write, admin", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoField {
    Name,
}

/// Repositories a new one can be linked to, as `(id, name)`.
pub const EXISTING_REPOS: [(&str, &str); 3] = [
    ("1", "Thesis Chapter 1 - Codebase"),
    ("2", "AI Capabilities Research"),
    ("3", "Platform UI/UX Templates"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    /// Invited handles, e.g. `@jdoe`.
    pub insiders: Vec<String>,
    pub access_level: AccessLevel,
    /// Id of a related repository from [`EXISTING_REPOS`].
    pub connect_to: Option<String>,
    #[serde(rename = "enable2D")]
    pub enable_2d: bool,
    #[serde(rename = "aiAssist2D")]
    pub ai_assist_2d: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            visibility: Visibility::Private,
            insiders: vec!["@jdoe".to_string(), "@team-alpha".to_string()],
            access_level: AccessLevel::Write,
            connect_to: None,
            enable_2d: true,
            ai_assist_2d: true,
        }
    }
}

impl RepoConfig {
    pub fn validate(&self) -> FieldErrors<RepoField> {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.insert(RepoField::Name, REPO_NAME_ERROR);
        }
        errors.finish()
    }

    /// Parse a comma-separated insider list, dropping blanks.
    pub fn set_insiders(&mut self, list: &str) {
        self.insiders = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    /// Insider access only applies to private repositories.
    pub fn effective_access_level(&self) -> Option<AccessLevel> {
        match self.visibility {
            Visibility::Private => Some(self.access_level),
            Visibility::Public => None,
        }
    }

    /// AI assistance needs the 2D canvas.
    pub fn ai_assist_enabled(&self) -> bool {
        self.enable_2d && self.ai_assist_2d
    }

    pub fn connected_repo_name(&self) -> Option<&'static str> {
        let id = self.connect_to.as_deref()?;
        EXISTING_REPOS
            .iter()
            .find(|(repo_id, _)| *repo_id == id)
            .map(|(_, name)| *name)
    }

    /// Validate and create. On success the caller navigates to the returned
    /// route.
    pub fn create(&self) -> Result<Route, FieldErrors<RepoField>> {
        let errors = self.validate();
        if !errors.is_empty() {
            tracing::warn!("Repository name is required");
            return Err(errors);
        }
        tracing::info!(
            name = %self.name,
            visibility = ?self.visibility,
            insiders = self.insiders.len(),
            canvas = self.enable_2d,
            "Created repository"
        );
        Ok(Route::Dashboard)
    }
}
