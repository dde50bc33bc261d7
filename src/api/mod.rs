pub mod assignment;
pub mod user;

use serde::{Deserialize, Serialize};

pub use self::{assignment::Assignment, user::User};

/// Human-readable outcome of a request.
///
/// `errors` is only present for rejected payloads and lists every failed
/// field rule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Message {
    pub msg: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Message {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(msg: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            msg: msg.into(),
            errors,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Token {
    pub token: String,
}
