use std::{collections::HashMap, error::Error as StdError, str::FromStr};

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash as Phc, PasswordHasher as _,
        PasswordVerifier as _, SaltString,
    },
    Argon2,
};
use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};
use uuid::Uuid;

use super::Client;

pub use argon2::password_hash::Error as HashError;

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: PasswordHash,
}

impl User {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            role: row.get("role"),
            password_hash: row.get("password_hash"),
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

/// Fixed at registration by the endpoint the account was created through.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    TryFromRepr,
    PartialEq,
    Serialize,
)]
#[repr(u8)]
pub enum Role {
    /// Reviews assignments addressed to them.
    Admin = 1,

    /// Submits assignments to an admin of their choice.
    User = 2,
}

impl FromSql<'_> for Role {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let role = Self::try_from(repr).map_err(|_| "invalid role")?;
        Ok(role)
    }
}

impl ToSql for Role {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from((*self) as u8);
        repr.to_sql(ty, out)
    }
}

/// Salted Argon2 digest in PHC string format.
#[derive(Clone, Debug)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(secret: &str) -> Result<Self, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| Self(hash.to_string()))
    }

    pub fn verify(&self, secret: &str) -> bool {
        Phc::new(&self.0)
            .and_then(|hash| {
                Argon2::default().verify_password(secret.as_bytes(), &hash)
            })
            .is_ok()
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

impl Client {
    /// Stores a new user unless the email is already taken.
    ///
    /// Returns `false` if another user owns the email. Uniqueness is
    /// enforced by the `users.email` constraint, so concurrent
    /// registrations cannot both succeed.
    pub async fn insert_user(&self, user: &User) -> Result<bool, Error> {
        const SQL: &str = "\
            INSERT INTO users (id, name, email, password_hash, role) \
            VALUES ($1, $2, $3, $4, $5) \
            ON CONFLICT (email) DO NOTHING";

        let inserted = self
            .0
            .execute(
                SQL,
                &[
                    &user.id,
                    &user.name,
                    &user.email,
                    &user.password_hash,
                    &user.role,
                ],
            )
            .await?;
        Ok(inserted == 1)
    }

    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, email, password_hash, role \
                           FROM users \
                           WHERE email = $1 \
                           LIMIT 1";
        Ok(self
            .0
            .query_opt(SQL, &[&email])
            .await?
            .as_ref()
            .map(User::from_row))
    }

    pub async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, email, password_hash, role \
                           FROM users \
                           WHERE id = $1 \
                           LIMIT 1";
        Ok(self
            .0
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(User::from_row))
    }

    pub async fn get_users_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, User>, Error> {
        const SQL: &str = "SELECT id, name, email, password_hash, role \
                           FROM users \
                           WHERE id IN (SELECT unnest($1::UUID[])) \
                           LIMIT $2";

        let limit = i64::try_from(ids.len()).unwrap_or(i64::MAX);

        Ok(self
            .0
            .query(SQL, &[&ids, &limit])
            .await?
            .iter()
            .map(|row| {
                let user = User::from_row(row);
                (user.id, user)
            })
            .collect())
    }

    pub async fn get_users_by_role(
        &self,
        role: Role,
    ) -> Result<Vec<User>, Error> {
        const SQL: &str = "SELECT id, name, email, password_hash, role \
                           FROM users \
                           WHERE role = $1 \
                           ORDER BY name, id";
        Ok(self
            .0
            .query(SQL, &[&role])
            .await?
            .iter()
            .map(User::from_row)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{Id, PasswordHash, Role};

    #[test]
    fn verifies_matching_password() {
        let hash = PasswordHash::new("Abcdef1!").unwrap();
        assert!(hash.verify("Abcdef1!"));
        assert!(!hash.verify("abcdef1!"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn salts_every_hash() {
        let first = PasswordHash::new("Abcdef1!").unwrap();
        let second = PasswordHash::new("Abcdef1!").unwrap();
        assert_ne!(first.0, second.0);
        assert!(second.verify("Abcdef1!"));
    }

    #[test]
    fn never_stores_plain_secret() {
        let hash = PasswordHash::new("Abcdef1!").unwrap();
        assert!(!hash.0.contains("Abcdef1!"));
        assert!(hash.0.starts_with("$argon2"));
    }

    #[test]
    fn rejects_malformed_stored_hash() {
        let hash = PasswordHash("Abcdef1!".to_string());
        assert!(!hash.verify("Abcdef1!"));
    }

    #[test]
    fn parses_id() {
        let id = "00000000-0000-0000-0000-000000000001".parse::<Id>().unwrap();
        assert_eq!(id, Id::from(1));
        assert!("not-an-id".parse::<Id>().is_err());
    }

    #[test]
    fn displays_role_literal() {
        assert_eq!(Role::Admin.to_string(), "Admin");
        assert_eq!(Role::User.to_string(), "User");
    }
}
