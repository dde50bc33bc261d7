use serde::{Deserialize, Serialize};

pub use crate::db::user::{Id, Role};

/// Directory entry of an account, the password hash is never exposed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&crate::db::User> for User {
    fn from(user: &crate::db::User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Party of an assignment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Brief {
    pub id: Id,
    pub name: String,
}

impl From<&crate::db::User> for Brief {
    fn from(user: &crate::db::User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}
