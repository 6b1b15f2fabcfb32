use std::error::Error as StdError;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};

use super::{Client, Error};

#[derive(Clone, Debug)]
pub struct Subject {
    pub id: Id,
    pub description: String,
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
    pub async fn get_subjects(&self) -> Result<Vec<Subject>, Error> {
        const SQL: &str =
            "SELECT id, description FROM subjects ORDER BY description";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| Subject {
                id: row.get("id"),
                description: row.get("description"),
            })
            .collect())
    }

    pub async fn get_subject_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Subject>, Error> {
        const SQL: &str =
            "SELECT id, description FROM subjects WHERE id = $1";
        Ok(self.0.get().await?.query_opt(SQL, &[&id]).await?.map(|row| {
            Subject {
                id: row.get("id"),
                description: row.get("description"),
            }
        }))
    }

    pub async fn create_subject(
        &self,
        description: &str,
    ) -> Result<Subject, Error> {
        const SQL: &str = "\
            INSERT INTO subjects (description) \
            VALUES ($1) \
            RETURNING id, description";
        let row = self.0.get().await?.query_one(SQL, &[&description]).await?;
        Ok(Subject {
            id: row.get("id"),
            description: row.get("description"),
        })
    }

    pub async fn update_subject(
        &self,
        id: Id,
        description: &str,
    ) -> Result<bool, Error> {
        const SQL: &str =
            "UPDATE subjects SET description = $2 WHERE id = $1";
        Ok(self
            .0
            .get()
            .await?
            .execute(SQL, &[&id, &description])
            .await?
            == 1)
    }

    pub async fn delete_subject(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM subjects WHERE id = $1";
        Ok(self.0.get().await?.execute(SQL, &[&id]).await? == 1)
    }
}
