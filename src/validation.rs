//! Request payload schemas.
//!
//! Each input collects every failed rule of every field before giving up, so
//! a client receives the whole list of problems in one response. Inputs are
//! validated before any store access.

use axum::extract::rejection::JsonRejection;
use serde::Deserialize;

use crate::db::user::{self, Role};

/// Field-level failure messages of a single request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Errors(Vec<String>);

impl Errors {
    pub fn into_messages(self) -> Vec<String> {
        self.0
    }

    fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Yields the validated value if no rule failed.
    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// Body that isn't JSON or whose fields have the wrong type.
impl From<JsonRejection> for Errors {
    fn from(rejection: JsonRejection) -> Self {
        Self(vec![rejection.body_text()])
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Validated registration.
#[derive(Clone, Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl RegisterInput {
    /// Validates the payload for the endpoint registering `role` accounts.
    ///
    /// The declared role must equal `role` literally, the stored role is
    /// always `role`.
    pub fn validate(self, role: Role) -> Result<Registration, Errors> {
        let mut errors = Errors::default();

        email(&mut errors, self.email.as_deref());
        strong_password(&mut errors, self.password.as_deref());
        name(&mut errors, self.name.as_deref());
        match self.role.as_deref() {
            None => errors.push("Role is required"),
            Some(declared) if declared != role.to_string() => {
                errors.push(format!("Role must be \"{role}\""));
            }
            Some(_) => {}
        }

        errors.finish(|| Registration {
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            role,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated login attempt.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    /// Only bounds the password length, so accounts created under weaker
    /// password rules can still log in.
    pub fn validate(self) -> Result<Credentials, Errors> {
        let mut errors = Errors::default();

        email(&mut errors, self.email.as_deref());
        if let Some(password) = required(&mut errors, "Password", &self.password)
        {
            password_length(&mut errors, password);
        }

        errors.finish(|| Credentials {
            email: self.email.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInput {
    pub task: Option<String>,
    pub admin_id: Option<String>,
}

/// Validated assignment upload.
#[derive(Clone, Debug)]
pub struct Upload {
    pub task: String,
    pub admin_id: user::Id,
}

impl UploadInput {
    pub fn validate(self) -> Result<Upload, Errors> {
        let mut errors = Errors::default();

        if let Some(task) = required(&mut errors, "Task", &self.task) {
            let len = length(task);
            if len < 5 {
                errors.push(
                    "Task description must be at least 5 characters long",
                );
            }
            if len > 500 {
                errors.push("Task description cannot exceed 500 characters");
            }
        }
        let admin_id = required(&mut errors, "Admin ID", &self.admin_id)
            .and_then(|id| match id.parse::<user::Id>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("Admin ID must be a valid identifier");
                    None
                }
            });

        errors.finish(|| Upload {
            task: self.task.unwrap_or_default(),
            admin_id: admin_id.unwrap_or_default(),
        })
    }
}

/// Counted in UTF-16 code units, as browser clients count them.
fn length(value: &str) -> usize {
    value.encode_utf16().count()
}

fn required<'a>(
    errors: &mut Errors,
    field: &str,
    value: &'a Option<String>,
) -> Option<&'a str> {
    if value.is_none() {
        errors.push(format!("{field} is required"));
    }
    value.as_deref()
}

fn email(errors: &mut Errors, value: Option<&str>) {
    match value {
        None => errors.push("Email is required"),
        Some(email) if !is_email(email) => errors.push("Invalid email address"),
        Some(_) => {}
    }
}

fn password_length(errors: &mut Errors, password: &str) {
    let len = length(password);
    if len < 8 {
        errors.push("Password must be at least 8 characters long");
    }
    if len > 20 {
        errors.push("Password cannot exceed 20 characters");
    }
}

fn strong_password(errors: &mut Errors, value: Option<&str>) {
    let Some(password) = value else {
        return errors.push("Password is required");
    };

    password_length(errors, password);
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number");
    }
    // Underscore is a word character but still counts as special.
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        errors.push("Password must contain at least one special character");
    }
}

fn name(errors: &mut Errors, value: Option<&str>) {
    let Some(name) = value else {
        return errors.push("Name is required");
    };

    let len = length(name);
    if len < 3 {
        errors.push("Name must be at least 3 characters long");
    }
    if len > 30 {
        errors.push("Name cannot exceed 30 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
    {
        errors.push("Name can only contain letters and spaces");
    }
}

/// `local@domain.tld` with a conservative character set on both sides.
fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '\'' | '+' | '-' | '.')
        });

    let labels = domain.split('.').collect::<Vec<_>>();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels.last().is_some_and(|tld| {
            tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        });

    local_ok && domain_ok
}
