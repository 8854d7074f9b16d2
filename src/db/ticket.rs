use std::{collections::HashMap, error::Error as StdError};

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

use super::{area, audit::AuditEntry, category, user, Client};

#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub category: category::Id,
    pub area: Option<area::Id>,
    pub priority: Priority,
    pub status: Status,
    pub requester: user::Id,
    pub assignee: Option<user::Id>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub closed_at: Option<OffsetDateTime>,
    pub rating: Option<Rating>,
    pub rating_comment: Option<String>,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Id(Uuid::new_v4())
    }

    /// Short human-readable reference used in notifications ("T-9f3c21ab").
    pub fn reference(&self) -> String {
        let full = self.0.to_string();
        format!("T-{}", &full[..8])
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
    Clone, Copy, Debug, Deserialize, Display, Eq, TryFromRepr, PartialEq,
    Serialize,
)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Status {
    /// Filed by the requester, not picked up yet.
    #[display("new")]
    New = 1,

    /// A technician is working on it.
    #[display("in progress")]
    InProgress = 2,

    /// Fixed from the technician's point of view, awaiting confirmation.
    #[display("resolved")]
    Resolved = 3,

    /// Confirmed done. The only status with a closure timestamp.
    #[display("closed")]
    Closed = 4,
}

impl FromSql<'_> for Status {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        // Unknown reprs are recovered, not rejected: the row stays readable
        // and the fallback is visible in the logs.
        Ok(Self::try_from(repr).unwrap_or_else(|_| {
            tracing::warn!(
                repr,
                "unknown ticket status in storage, recovering as in-progress"
            );
            Self::InProgress
        }))
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

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, TryFromRepr, PartialEq,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    #[display("low")]
    Low = 1,

    #[display("medium")]
    Medium = 2,

    #[display("high")]
    High = 3,

    #[display("critical")]
    Critical = 4,
}

impl FromSql<'_> for Priority {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        Ok(Self::try_from(repr).unwrap_or_else(|_| {
            tracing::warn!(
                repr,
                "unknown ticket priority in storage, recovering as medium"
            );
            Self::Medium
        }))
    }
}

impl ToSql for Priority {
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

/// Satisfaction score, always within 1..=5.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(score: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&score)
            .then_some(Self(score))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Display)]
#[display("rating out of range: {_0}")]
pub struct RatingOutOfRange(u8);

impl StdError for RatingOutOfRange {}

impl TryFrom<u8> for Rating {
    type Error = RatingOutOfRange;

    fn try_from(score: u8) -> Result<Self, Self::Error> {
        Self::new(score).ok_or(RatingOutOfRange(score))
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl FromSql<'_> for Rating {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        Ok(Self::try_from(repr)?)
    }
}

impl ToSql for Rating {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from(self.0);
        repr.to_sql(ty, out)
    }
}

fn from_row(row: &Row) -> Ticket {
    Ticket {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category_id"),
        area: row.get("area_id"),
        priority: row.get("priority"),
        status: row.get("status"),
        requester: row.get("requester_id"),
        assignee: row.get("assignee_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        closed_at: row.get("closed_at"),
        rating: row.get("rating"),
        rating_comment: row.get("rating_comment"),
    }
}

/// Filters for the tabular report. `None` means "don't filter".
#[derive(Clone, Copy, Debug, Default)]
pub struct ReportFilter {
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
    pub category: Option<category::Id>,
    pub priority: Option<Priority>,
    pub assignee: Option<user::Id>,
}

impl Client {
    pub async fn get_ticket_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Ticket>, Error> {
        const SQL: &str = "\
            SELECT id, title, description, category_id, area_id, \
                   priority, status, requester_id, assignee_id, \
                   created_at, updated_at, closed_at, \
                   rating, rating_comment \
            FROM tickets \
            WHERE id = $1";
        Ok(self
            .0
            .query_opt(SQL, &[&id])
            .await?
            .map(|row| from_row(&row)))
    }

    /// Upserts the ticket and appends its audit entry in one statement, so
    /// the mutation and its trail commit atomically.
    pub async fn write_ticket_with_audit(
        &self,
        ticket: &Ticket,
        entry: &AuditEntry,
    ) -> Result<(), Error> {
        const SQL: &str = "\
            WITH upserted AS (\
                INSERT INTO tickets (id, title, description, category_id, \
                                     area_id, priority, status, \
                                     requester_id, assignee_id, \
                                     created_at, updated_at, closed_at, \
                                     rating, rating_comment) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, \
                        $8, $9, $10, $11, $12, $13, $14) \
                ON CONFLICT (id) DO UPDATE \
                SET title = EXCLUDED.title, \
                    description = EXCLUDED.description, \
                    category_id = EXCLUDED.category_id, \
                    area_id = EXCLUDED.area_id, \
                    priority = EXCLUDED.priority, \
                    status = EXCLUDED.status, \
                    requester_id = EXCLUDED.requester_id, \
                    assignee_id = EXCLUDED.assignee_id, \
                    created_at = EXCLUDED.created_at, \
                    updated_at = EXCLUDED.updated_at, \
                    closed_at = EXCLUDED.closed_at, \
                    rating = EXCLUDED.rating, \
                    rating_comment = EXCLUDED.rating_comment\
            ) \
            INSERT INTO ticket_audit (id, ticket_id, actor_id, action, at) \
            VALUES ($15, $16, $17, $18, $19)";

        self.0
            .execute(
                SQL,
                &[
                    &ticket.id,
                    &ticket.title,
                    &ticket.description,
                    &ticket.category,
                    &ticket.area,
                    &ticket.priority,
                    &ticket.status,
                    &ticket.requester,
                    &ticket.assignee,
                    &ticket.created_at,
                    &ticket.updated_at,
                    &ticket.closed_at,
                    &ticket.rating,
                    &ticket.rating_comment,
                    &entry.id,
                    &entry.ticket,
                    &entry.actor,
                    &entry.action,
                    &entry.at,
                ],
            )
            .await
            .map(drop)
    }

    pub async fn get_tickets_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error> {
        let offset = i64::try_from(offset).unwrap();
        let limit = i64::try_from(limit).unwrap();

        const SQL: &str = "\
            SELECT id, title, description, category_id, area_id, \
                   priority, status, requester_id, assignee_id, \
                   created_at, updated_at, closed_at, \
                   rating, rating_comment \
            FROM tickets \
            ORDER BY created_at DESC, \
                     id DESC \
            OFFSET $1 LIMIT $2";
        Ok(self
            .0
            .query(SQL, &[&offset, &limit])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    pub async fn get_tickets_page_by_requester(
        &self,
        requester: user::Id,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error> {
        let offset = i64::try_from(offset).unwrap();
        let limit = i64::try_from(limit).unwrap();

        const SQL: &str = "\
            SELECT id, title, description, category_id, area_id, \
                   priority, status, requester_id, assignee_id, \
                   created_at, updated_at, closed_at, \
                   rating, rating_comment \
            FROM tickets \
            WHERE requester_id = $1 \
            ORDER BY created_at DESC, \
                     id DESC \
            OFFSET $2 LIMIT $3";
        Ok(self
            .0
            .query(SQL, &[&requester, &offset, &limit])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    pub async fn get_tickets_count(&self) -> Result<usize, Error> {
        const SQL: &str = "SELECT COUNT(*) FROM tickets";
        Ok(self
            .0
            .query_one(SQL, &[])
            .await?
            .get::<_, i64>(0)
            .try_into()
            .unwrap())
    }

    pub async fn get_tickets_count_by_requester(
        &self,
        requester: user::Id,
    ) -> Result<usize, Error> {
        const SQL: &str =
            "SELECT COUNT(*) FROM tickets WHERE requester_id = $1";
        Ok(self
            .0
            .query_one(SQL, &[&requester])
            .await?
            .get::<_, i64>(0)
            .try_into()
            .unwrap())
    }

    /// Snapshot for the report surface. Unpaged on purpose.
    pub async fn get_report_tickets(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<Ticket>, Error> {
        const SQL: &str = "\
            SELECT id, title, description, category_id, area_id, \
                   priority, status, requester_id, assignee_id, \
                   created_at, updated_at, closed_at, \
                   rating, rating_comment \
            FROM tickets \
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1) \
              AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2) \
              AND ($3::UUID IS NULL OR category_id = $3) \
              AND ($4::INT2 IS NULL OR priority = $4) \
              AND ($5::UUID IS NULL OR assignee_id = $5) \
            ORDER BY created_at DESC, \
                     id DESC";
        Ok(self
            .0
            .query(
                SQL,
                &[
                    &filter.from,
                    &filter.to,
                    &filter.category,
                    &filter.priority,
                    &filter.assignee,
                ],
            )
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    pub async fn get_tickets_count_by_category(
        &self,
    ) -> Result<HashMap<category::Id, usize>, Error> {
        const SQL: &str = "SELECT category_id, COUNT(*) AS count \
                           FROM tickets \
                           GROUP BY category_id";
        Ok(self
            .0
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| {
                let count =
                    usize::try_from(row.get::<_, i64>("count")).unwrap();
                (row.get("category_id"), count)
            })
            .collect())
    }
}
