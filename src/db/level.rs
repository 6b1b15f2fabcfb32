use std::error::Error as StdError;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};

use super::{Client, Error};

#[derive(Clone, Debug)]
pub struct Level {
    pub id: Id,
    pub name: String,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq,
    Serialize,
)]
pub struct Id(i16);

impl From<i16> for Id {
    fn from(value: i16) -> Self {
        Self(value)
    }
}

impl FromSql<'_> for Id {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        i16::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(INT2);

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
    pub async fn get_levels(&self) -> Result<Vec<Level>, Error> {
        const SQL: &str =
            "SELECT id, name FROM education_levels ORDER BY id";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| Level {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    pub async fn get_level_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Level>, Error> {
        const SQL: &str =
            "SELECT id, name FROM education_levels WHERE id = $1";
        Ok(self.0.get().await?.query_opt(SQL, &[&id]).await?.map(|row| {
            Level {
                id: row.get("id"),
                name: row.get("name"),
            }
        }))
    }

    pub async fn create_level(&self, name: &str) -> Result<Level, Error> {
        const SQL: &str = "\
            INSERT INTO education_levels (name) \
            VALUES ($1) \
            RETURNING id, name";
        let row = self.0.get().await?.query_one(SQL, &[&name]).await?;
        Ok(Level {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    pub async fn update_level(
        &self,
        id: Id,
        name: &str,
    ) -> Result<bool, Error> {
        const SQL: &str =
            "UPDATE education_levels SET name = $2 WHERE id = $1";
        Ok(self.0.get().await?.execute(SQL, &[&id, &name]).await? == 1)
    }

    pub async fn delete_level(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM education_levels WHERE id = $1";
        Ok(self.0.get().await?.execute(SQL, &[&id]).await? == 1)
    }
}
