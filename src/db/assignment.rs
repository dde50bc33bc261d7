use std::error::Error as StdError;

use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};
use uuid::Uuid;

use super::{user, Client};

#[derive(Clone, Debug)]
pub struct Assignment {
    pub id: Id,
    pub task: String,
    pub status: Status,
    /// Submitter, always a [`user::Role::User`].
    pub user: user::Id,
    /// Reviewer, resolved to a [`user::Role::Admin`] at creation time.
    pub admin: user::Id,
    pub created_at: OffsetDateTime,
}

impl Assignment {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            task: row.get("task"),
            status: row.get("status"),
            user: row.get("user_id"),
            admin: row.get("admin_id"),
            created_at: row.get("created_at"),
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
        Id(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
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

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[repr(u8)]
pub enum Status {
    /// Submitted and waiting for the admin's decision.
    Pending = 1,

    /// Admin accepted the assignment.
    Accepted = 2,

    /// Admin rejected the assignment.
    Rejected = 3,
}

impl Status {
    /// Applies a review decision.
    ///
    /// Only [`Status::Pending`] can be reviewed, both outcomes are final.
    pub fn review(self, decision: Decision) -> Option<Self> {
        match self {
            Self::Pending => Some(decision.outcome()),
            Self::Accepted | Self::Rejected => None,
        }
    }
}

impl FromSql<'_> for Status {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let status = Self::try_from(repr).map_err(|_| "invalid status")?;
        Ok(status)
    }
}

impl ToSql for Status {
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

/// Admin's verdict on a pending assignment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn outcome(self) -> Status {
        match self {
            Self::Accept => Status::Accepted,
            Self::Reject => Status::Rejected,
        }
    }
}

impl Client {
    pub async fn insert_assignment(
        &self,
        assignment: &Assignment,
    ) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO assignments (id, task, status, user_id, admin_id, \
                                     created_at) \
            VALUES ($1, $2, $3, $4, $5, $6)";

        self.0
            .execute(
                SQL,
                &[
                    &assignment.id,
                    &assignment.task,
                    &assignment.status,
                    &assignment.user,
                    &assignment.admin,
                    &assignment.created_at,
                ],
            )
            .await
            .map(drop)
    }

    pub async fn get_assignment_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Assignment>, Error> {
        const SQL: &str = "\
            SELECT id, task, status, user_id, admin_id, created_at \
            FROM assignments \
            WHERE id = $1";
        Ok(self
            .0
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(Assignment::from_row))
    }

    /// Assignments addressed to the admin, newest first.
    pub async fn get_assignments_by_admin(
        &self,
        admin: user::Id,
    ) -> Result<Vec<Assignment>, Error> {
        const SQL: &str = "\
            SELECT id, task, status, user_id, admin_id, created_at \
            FROM assignments \
            WHERE admin_id = $1 \
            ORDER BY created_at DESC, \
                     id DESC";
        Ok(self
            .0
            .query(SQL, &[&admin])
            .await?
            .iter()
            .map(Assignment::from_row)
            .collect())
    }

    /// Assignments submitted by the user, newest first.
    pub async fn get_assignments_by_user(
        &self,
        user: user::Id,
    ) -> Result<Vec<Assignment>, Error> {
        const SQL: &str = "\
            SELECT id, task, status, user_id, admin_id, created_at \
            FROM assignments \
            WHERE user_id = $1 \
            ORDER BY created_at DESC, \
                     id DESC";
        Ok(self
            .0
            .query(SQL, &[&user])
            .await?
            .iter()
            .map(Assignment::from_row)
            .collect())
    }

    /// Moves the assignment from `from` to `to` status.
    ///
    /// Returns `false` if the stored status is no longer `from`, meaning a
    /// concurrent review already took place.
    pub async fn update_assignment_status(
        &self,
        id: Id,
        from: Status,
        to: Status,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            UPDATE assignments \
            SET status = $3 \
            WHERE id = $1 AND status = $2";

        let updated = self.0.execute(SQL, &[&id, &from, &to]).await?;
        Ok(updated == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::{Decision, Status};

    #[test]
    fn pending_can_be_accepted_or_rejected() {
        assert_eq!(
            Status::Pending.review(Decision::Accept),
            Some(Status::Accepted),
        );
        assert_eq!(
            Status::Pending.review(Decision::Reject),
            Some(Status::Rejected),
        );
    }

    #[test]
    fn reviewed_status_is_final() {
        for status in [Status::Accepted, Status::Rejected] {
            assert_eq!(status.review(Decision::Accept), None);
            assert_eq!(status.review(Decision::Reject), None);
        }
    }

    #[test]
    fn converts_status_repr() {
        assert_eq!(Status::try_from(1u8), Ok(Status::Pending));
        assert_eq!(Status::try_from(3u8), Ok(Status::Rejected));
        assert!(Status::try_from(4u8).is_err());
    }
}
