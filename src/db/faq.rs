use std::error::Error as StdError;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error,
};
use uuid::Uuid;

use super::{user, Client};

/// Knowledge-base entry shown on every dashboard.
#[derive(Clone, Debug)]
pub struct Faq {
    pub id: Id,
    pub question: String,
    pub answer: String,
    pub created_by: Option<user::Id>,
    pub created_at: OffsetDateTime,
    pub active: bool,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq,
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

impl Client {
    pub async fn get_faq_by_id(&self, id: Id) -> Result<Option<Faq>, Error> {
        const SQL: &str =
            "SELECT id, question, answer, created_by, created_at, active \
             FROM faqs \
             WHERE id = $1";
        Ok(self.0.query_opt(SQL, &[&id]).await?.map(|row| Faq {
            id: row.get("id"),
            question: row.get("question"),
            answer: row.get("answer"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
            active: row.get("active"),
        }))
    }

    pub async fn get_active_faqs(&self) -> Result<Vec<Faq>, Error> {
        const SQL: &str =
            "SELECT id, question, answer, created_by, created_at, active \
             FROM faqs \
             WHERE active \
             ORDER BY created_at DESC";
        Ok(self
            .0
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| Faq {
                id: row.get("id"),
                question: row.get("question"),
                answer: row.get("answer"),
                created_by: row.get("created_by"),
                created_at: row.get("created_at"),
                active: row.get("active"),
            })
            .collect())
    }

    pub async fn write_faq(&self, faq: &Faq) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO faqs (id, question, answer, created_by, \
                              created_at, active) \
            VALUES ($1, $2, $3, $4, $5, $6) \
            ON CONFLICT (id) DO UPDATE \
            SET question = EXCLUDED.question, \
                answer = EXCLUDED.answer, \
                active = EXCLUDED.active";
        self.0
            .execute(
                SQL,
                &[
                    &faq.id,
                    &faq.question,
                    &faq.answer,
                    &faq.created_by,
                    &faq.created_at,
                    &faq.active,
                ],
            )
            .await
            .map(drop)
    }

    pub async fn delete_faq(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM faqs WHERE id = $1";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }
}
