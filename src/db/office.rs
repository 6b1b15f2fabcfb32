use std::error::Error as StdError;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};

use super::{municipality, Client, Error, Tx};

#[derive(Clone, Debug)]
pub struct Office {
    pub id: Id,
    pub name: String,
    pub municipality: municipality::Id,
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

const SELECT_BY_ID_SQL: &str = "\
    SELECT id, name, municipality_id \
    FROM offices \
    WHERE id = $1";

impl Client {
    pub async fn get_offices(&self) -> Result<Vec<Office>, Error> {
        const SQL: &str = "\
            SELECT id, name, municipality_id \
            FROM offices \
            ORDER BY name";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| Office {
                id: row.get("id"),
                name: row.get("name"),
                municipality: row.get("municipality_id"),
            })
            .collect())
    }

    pub async fn get_offices_by_municipality(
        &self,
        municipality: municipality::Id,
    ) -> Result<Vec<Office>, Error> {
        const SQL: &str = "\
            SELECT id, name, municipality_id \
            FROM offices \
            WHERE municipality_id = $1 \
            ORDER BY name";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[&municipality])
            .await?
            .into_iter()
            .map(|row| Office {
                id: row.get("id"),
                name: row.get("name"),
                municipality: row.get("municipality_id"),
            })
            .collect())
    }

    pub async fn get_office_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Office>, Error> {
        Ok(self
            .0
            .get()
            .await?
            .query_opt(SELECT_BY_ID_SQL, &[&id])
            .await?
            .map(|row| Office {
                id: row.get("id"),
                name: row.get("name"),
                municipality: row.get("municipality_id"),
            }))
    }

    pub async fn create_office(
        &self,
        name: &str,
        municipality: municipality::Id,
    ) -> Result<Office, Error> {
        const SQL: &str = "\
            INSERT INTO offices (name, municipality_id) \
            VALUES ($1, $2) \
            RETURNING id, name, municipality_id";
        let row = self
            .0
            .get()
            .await?
            .query_one(SQL, &[&name, &municipality])
            .await?;
        Ok(Office {
            id: row.get("id"),
            name: row.get("name"),
            municipality: row.get("municipality_id"),
        })
    }

    pub async fn update_office(
        &self,
        id: Id,
        name: &str,
        municipality: municipality::Id,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            UPDATE offices \
            SET name = $2, municipality_id = $3 \
            WHERE id = $1";
        Ok(self
            .0
            .get()
            .await?
            .execute(SQL, &[&id, &name, &municipality])
            .await?
            == 1)
    }

    pub async fn delete_office(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM offices WHERE id = $1";
        Ok(self.0.get().await?.execute(SQL, &[&id]).await? == 1)
    }
}

impl Tx<'_> {
    pub async fn get_office_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Office>, Error> {
        Ok(self
            .0
            .query_opt(SELECT_BY_ID_SQL, &[&id])
            .await?
            .map(|row| Office {
                id: row.get("id"),
                name: row.get("name"),
                municipality: row.get("municipality_id"),
            }))
    }
}
