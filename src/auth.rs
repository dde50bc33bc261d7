//! Session tokens and password checks.
//!
//! A token is an HS256 JWT embedding the user's id and role. Expiry is the
//! only bound on its lifetime, there is no revocation.

use std::time::Duration;

use derive_more::{Display, From};
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task;

use crate::db::user::{self, HashError, PasswordHash, Role};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: user::Id,
    pub role: Role,
    pub exp: i64,
}

impl Claims {
    /// Fails unless the token was issued to an account with `role`.
    pub fn require(self, role: Role) -> Result<Self, Forbidden> {
        if self.role == role {
            Ok(self)
        } else {
            Err(Forbidden)
        }
    }
}

/// Token holder's role doesn't permit the operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Forbidden;

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Hash(HashError),
    #[from]
    Join(task::JoinError),
    #[from]
    Token(jsonwebtoken::errors::Error),
}

/// Issues and verifies session tokens.
pub struct Authority {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    expiration_time: Duration,
    validation: Validation,
}

impl Authority {
    pub fn new(secret: &[u8], expiration_time: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
            expiration_time,
            validation,
        }
    }

    pub fn issue(&self, user_id: user::Id, role: Role) -> Result<String, Error> {
        self.issue_at(user_id, role, OffsetDateTime::now_utc())
    }

    fn issue_at(
        &self,
        user_id: user::Id,
        role: Role,
        issued_at: OffsetDateTime,
    ) -> Result<String, Error> {
        let expires_at = issued_at + self.expiration_time;
        let claims = Claims {
            user_id,
            role,
            exp: expires_at.unix_timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Checks the signature and expiry of `token`.
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

/// Hashes `password` off the async runtime.
pub async fn hash_password(password: String) -> Result<PasswordHash, Error> {
    Ok(task::spawn_blocking(move || PasswordHash::new(&password)).await??)
}

pub async fn verify_password(
    password: String,
    hash: PasswordHash,
) -> Result<bool, Error> {
    Ok(task::spawn_blocking(move || hash.verify(&password)).await?)
}
