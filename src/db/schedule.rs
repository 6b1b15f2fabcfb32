use std::error::Error as StdError;

use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::Time;
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};

use super::{office, Client, Error, Tx};

/// One weekly opening-hours entry of an office. An office has at most
/// one entry per weekday.
#[derive(Clone, Debug)]
pub struct WeeklyHours {
    pub id: Id,
    pub office: office::Id,
    pub weekday: Weekday,
    pub opens_at: Time,
    pub closes_at: Time,
    pub max_tickets: i16,
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

/// The fixed 7-value weekday space the schedule is keyed by. Calendar
/// dates map into it via [`From<time::Weekday>`].
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, TryFromRepr, PartialEq,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

impl From<time::Weekday> for Weekday {
    fn from(value: time::Weekday) -> Self {
        match value {
            time::Weekday::Monday => Self::Monday,
            time::Weekday::Tuesday => Self::Tuesday,
            time::Weekday::Wednesday => Self::Wednesday,
            time::Weekday::Thursday => Self::Thursday,
            time::Weekday::Friday => Self::Friday,
            time::Weekday::Saturday => Self::Saturday,
            time::Weekday::Sunday => Self::Sunday,
        }
    }
}

impl FromSql<'_> for Weekday {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let weekday = Self::try_from(repr).map_err(|_| "invalid weekday")?;
        Ok(weekday)
    }
}

impl ToSql for Weekday {
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

impl Client {
    pub async fn get_hours(&self) -> Result<Vec<WeeklyHours>, Error> {
        const SQL: &str = "\
            SELECT id, office_id, weekday, opens_at, closes_at, \
                   max_tickets \
            FROM weekly_hours \
            ORDER BY office_id, weekday";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| WeeklyHours {
                id: row.get("id"),
                office: row.get("office_id"),
                weekday: row.get("weekday"),
                opens_at: row.get("opens_at"),
                closes_at: row.get("closes_at"),
                max_tickets: row.get("max_tickets"),
            })
            .collect())
    }

    pub async fn get_hours_by_office(
        &self,
        office: office::Id,
    ) -> Result<Vec<WeeklyHours>, Error> {
        const SQL: &str = "\
            SELECT id, office_id, weekday, opens_at, closes_at, \
                   max_tickets \
            FROM weekly_hours \
            WHERE office_id = $1 \
            ORDER BY weekday";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[&office])
            .await?
            .into_iter()
            .map(|row| WeeklyHours {
                id: row.get("id"),
                office: row.get("office_id"),
                weekday: row.get("weekday"),
                opens_at: row.get("opens_at"),
                closes_at: row.get("closes_at"),
                max_tickets: row.get("max_tickets"),
            })
            .collect())
    }

    pub async fn update_hours(
        &self,
        id: Id,
        office: office::Id,
        weekday: Weekday,
        opens_at: Time,
        closes_at: Time,
        max_tickets: i16,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            UPDATE weekly_hours \
            SET office_id = $2, weekday = $3, opens_at = $4, \
                closes_at = $5, max_tickets = $6 \
            WHERE id = $1";
        Ok(self
            .0
            .get()
            .await?
            .execute(
                SQL,
                &[
                    &id,
                    &office,
                    &weekday,
                    &opens_at,
                    &closes_at,
                    &max_tickets,
                ],
            )
            .await?
            == 1)
    }

    pub async fn delete_hours(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM weekly_hours WHERE id = $1";
        Ok(self.0.get().await?.execute(SQL, &[&id]).await? == 1)
    }
}

impl Tx<'_> {
    pub async fn create_hours(
        &self,
        office: office::Id,
        weekday: Weekday,
        opens_at: Time,
        closes_at: Time,
        max_tickets: i16,
    ) -> Result<WeeklyHours, Error> {
        const SQL: &str = "\
            INSERT INTO weekly_hours (office_id, weekday, opens_at, \
                                      closes_at, max_tickets) \
            VALUES ($1, $2, $3, $4, $5) \
            RETURNING id, office_id, weekday, opens_at, closes_at, \
                      max_tickets";
        let row = self
            .0
            .query_one(
                SQL,
                &[&office, &weekday, &opens_at, &closes_at, &max_tickets],
            )
            .await?;
        Ok(WeeklyHours {
            id: row.get("id"),
            office: row.get("office_id"),
            weekday: row.get("weekday"),
            opens_at: row.get("opens_at"),
            closes_at: row.get("closes_at"),
            max_tickets: row.get("max_tickets"),
        })
    }

    pub async fn get_hours_for_weekday(
        &self,
        office: office::Id,
        weekday: Weekday,
    ) -> Result<Option<WeeklyHours>, Error> {
        const SQL: &str = "\
            SELECT id, office_id, weekday, opens_at, closes_at, \
                   max_tickets \
            FROM weekly_hours \
            WHERE office_id = $1 AND weekday = $2";
        Ok(self.0.query_opt(SQL, &[&office, &weekday]).await?.map(|row| {
            WeeklyHours {
                id: row.get("id"),
                office: row.get("office_id"),
                weekday: row.get("weekday"),
                opens_at: row.get("opens_at"),
                closes_at: row.get("closes_at"),
                max_tickets: row.get("max_tickets"),
            }
        }))
    }
}
