use std::{collections::HashMap, error::Error as StdError};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error,
};
use uuid::Uuid;

use super::Client;

/// Ticket classification lookup. Deactivated rather than deleted in the
/// normal flow; hard delete exists for the admin surface.
#[derive(Clone, Debug)]
pub struct Category {
    pub id: Id,
    pub name: String,
    pub description: String,
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
    pub async fn get_category_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Category>, Error> {
        const SQL: &str = "SELECT id, name, description, active \
                           FROM categories \
                           WHERE id = $1";
        Ok(self.0.query_opt(SQL, &[&id]).await?.map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            active: row.get("active"),
        }))
    }

    pub async fn get_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Category>, Error> {
        const SQL: &str = "SELECT id, name, description, active \
                           FROM categories \
                           WHERE name = $1 \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&name]).await?.map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            active: row.get("active"),
        }))
    }

    pub async fn get_all_categories(&self) -> Result<Vec<Category>, Error> {
        const SQL: &str = "SELECT id, name, description, active \
                           FROM categories \
                           ORDER BY name";
        Ok(self
            .0
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
                description: row.get("description"),
                active: row.get("active"),
            })
            .collect())
    }

    pub async fn get_categories_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, Category>, Error> {
        const SQL: &str = "SELECT id, name, description, active \
                           FROM categories \
                           WHERE id IN (SELECT unnest($1::UUID[]))";
        Ok(self
            .0
            .query(SQL, &[&ids])
            .await?
            .into_iter()
            .map(|row| {
                let category = Category {
                    id: row.get("id"),
                    name: row.get("name"),
                    description: row.get("description"),
                    active: row.get("active"),
                };
                (category.id, category)
            })
            .collect())
    }

    pub async fn write_category(
        &self,
        category: &Category,
    ) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO categories (id, name, description, active) \
            VALUES ($1, $2, $3, $4) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                description = EXCLUDED.description, \
                active = EXCLUDED.active";
        self.0
            .execute(
                SQL,
                &[
                    &category.id,
                    &category.name,
                    &category.description,
                    &category.active,
                ],
            )
            .await
            .map(drop)
    }

    pub async fn delete_category(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM categories WHERE id = $1";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }
}
