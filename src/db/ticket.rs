use std::error::Error as StdError;

use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use uuid::Uuid;

use super::{
    level, office,
    requester::{self, Curp, Fields, Requester},
    subject, Client, Error, Tx,
};

/// An issued turno. Never hard-deleted; cancellation is a status
/// transition.
#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: Id,
    pub requester: requester::Id,
    pub office: office::Id,
    /// The folio: sequential display number, scoped per municipality.
    pub number: i32,
    pub scheduled_on: Date,
    pub scheduled_at: Time,
    pub level: level::Id,
    pub subject: subject::Id,
    pub status: Status,
    /// Lookup token printed on the receipt, derived from the
    /// requester's CURP at issuance time.
    pub lookup_code: String,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A ticket together with its requester, as returned by the public
/// lookup.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub ticket: Ticket,
    pub requester: Requester,
}

/// One row of the admin listing: a ticket with the display fields the
/// listing joins in.
#[derive(Clone, Debug)]
pub struct Summary {
    pub ticket: Ticket,
    pub requester_name: String,
    pub curp: Curp,
    pub office_name: String,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, PartialEq, Serialize,
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
    Clone, Copy, Debug, Deserialize, TryFromRepr, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Waiting to be attended at the office.
    Pending = 1,

    /// Attended and closed by an administrator.
    Resolved = 2,

    /// Withdrawn by the citizen or an administrator. Terminal.
    Cancelled = 3,
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

/// Which tickets the admin listing shows.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Active,
    Cancelled,
}

impl Tx<'_> {
    pub async fn count_tickets_for_day(
        &self,
        office: office::Id,
        on: Date,
    ) -> Result<i64, Error> {
        const SQL: &str = "\
            SELECT COUNT(*) AS total \
            FROM tickets \
            WHERE office_id = $1 \
              AND scheduled_on = $2 \
              AND status <> $3";
        Ok(self
            .0
            .query_one(SQL, &[&office, &on, &Status::Cancelled])
            .await?
            .get("total"))
    }

    pub async fn is_slot_taken(
        &self,
        office: office::Id,
        on: Date,
        at: Time,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            SELECT EXISTS( \
                SELECT 1 \
                FROM tickets \
                WHERE office_id = $1 \
                  AND scheduled_on = $2 \
                  AND scheduled_at = $3 \
                  AND status <> $4 \
            ) AS taken";
        Ok(self
            .0
            .query_one(SQL, &[&office, &on, &at, &Status::Cancelled])
            .await?
            .get("taken"))
    }

    pub async fn write_ticket(&self, ticket: &Ticket) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO tickets (id, requester_id, office_id, number, \
                                 scheduled_on, scheduled_at, level_id, \
                                 subject_id, status, lookup_code, notes, \
                                 created_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";
        self.0
            .execute(
                SQL,
                &[
                    &ticket.id,
                    &ticket.requester,
                    &ticket.office,
                    &ticket.number,
                    &ticket.scheduled_on,
                    &ticket.scheduled_at,
                    &ticket.level,
                    &ticket.subject,
                    &ticket.status,
                    &ticket.lookup_code,
                    &ticket.notes,
                    &ticket.created_at,
                ],
            )
            .await
            .map(drop)
            .map_err(Into::into)
    }

    pub async fn get_ticket_by_number(
        &self,
        number: i32,
        curp: &Curp,
    ) -> Result<Option<Snapshot>, Error> {
        const SQL: &str = "\
            SELECT t.id, t.requester_id, t.office_id, t.number, \
                   t.scheduled_on, t.scheduled_at, t.level_id, \
                   t.subject_id, t.status, t.lookup_code, t.notes, \
                   t.created_at, \
                   r.curp, r.full_name, r.given_name, \
                   r.paternal_surname, r.maternal_surname, r.phone, \
                   r.mobile, r.email, r.registered_at \
            FROM tickets t \
            JOIN requesters r ON r.id = t.requester_id \
            WHERE t.number = $1 AND r.curp = $2 \
            ORDER BY t.created_at DESC \
            LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&number, curp]).await?.map(|row| {
            Snapshot {
                ticket: Ticket {
                    id: row.get("id"),
                    requester: row.get("requester_id"),
                    office: row.get("office_id"),
                    number: row.get("number"),
                    scheduled_on: row.get("scheduled_on"),
                    scheduled_at: row.get("scheduled_at"),
                    level: row.get("level_id"),
                    subject: row.get("subject_id"),
                    status: row.get("status"),
                    lookup_code: row.get("lookup_code"),
                    notes: row.get("notes"),
                    created_at: row.get("created_at"),
                },
                requester: Requester {
                    id: row.get("requester_id"),
                    curp: row.get("curp"),
                    fields: Fields {
                        full_name: row.get("full_name"),
                        given_name: row.get("given_name"),
                        paternal_surname: row.get("paternal_surname"),
                        maternal_surname: row.get("maternal_surname"),
                        phone: row.get("phone"),
                        mobile: row.get("mobile"),
                        email: row.get("email"),
                    },
                    registered_at: row.get("registered_at"),
                },
            }
        }))
    }

    pub async fn set_ticket_status(
        &self,
        id: Id,
        from: Status,
        to: Status,
    ) -> Result<u64, Error> {
        const SQL: &str =
            "UPDATE tickets SET status = $3 WHERE id = $1 AND status = $2";
        Ok(self.0.execute(SQL, &[&id, &from, &to]).await?)
    }

    pub async fn set_ticket_route(
        &self,
        id: Id,
        office: office::Id,
        level: level::Id,
        subject: subject::Id,
        from: Status,
    ) -> Result<u64, Error> {
        const SQL: &str = "\
            UPDATE tickets \
            SET office_id = $2, level_id = $3, subject_id = $4 \
            WHERE id = $1 AND status = $5";
        Ok(self
            .0
            .execute(SQL, &[&id, &office, &level, &subject, &from])
            .await?)
    }
}

impl Client {
    pub async fn search_tickets(
        &self,
        query: &str,
        view: View,
    ) -> Result<Vec<Summary>, Error> {
        const ACTIVE_SQL: &str = "\
            SELECT t.id, t.requester_id, t.office_id, t.number, \
                   t.scheduled_on, t.scheduled_at, t.level_id, \
                   t.subject_id, t.status, t.lookup_code, t.notes, \
                   t.created_at, \
                   r.full_name, r.curp, o.name AS office_name \
            FROM tickets t \
            JOIN requesters r ON r.id = t.requester_id \
            JOIN offices o ON o.id = t.office_id \
            WHERE (r.curp ILIKE $1 OR r.full_name ILIKE $1) \
              AND t.status <> $2 \
            ORDER BY t.scheduled_on DESC, t.scheduled_at DESC \
            LIMIT 50";
        const CANCELLED_SQL: &str = "\
            SELECT t.id, t.requester_id, t.office_id, t.number, \
                   t.scheduled_on, t.scheduled_at, t.level_id, \
                   t.subject_id, t.status, t.lookup_code, t.notes, \
                   t.created_at, \
                   r.full_name, r.curp, o.name AS office_name \
            FROM tickets t \
            JOIN requesters r ON r.id = t.requester_id \
            JOIN offices o ON o.id = t.office_id \
            WHERE (r.curp ILIKE $1 OR r.full_name ILIKE $1) \
              AND t.status = $2 \
            ORDER BY t.scheduled_on DESC, t.scheduled_at DESC \
            LIMIT 50";

        let sql = match view {
            View::Active => ACTIVE_SQL,
            View::Cancelled => CANCELLED_SQL,
        };
        let pattern = format!("%{query}%");

        Ok(self
            .0
            .get()
            .await?
            .query(sql, &[&pattern, &Status::Cancelled])
            .await?
            .into_iter()
            .map(|row| Summary {
                ticket: Ticket {
                    id: row.get("id"),
                    requester: row.get("requester_id"),
                    office: row.get("office_id"),
                    number: row.get("number"),
                    scheduled_on: row.get("scheduled_on"),
                    scheduled_at: row.get("scheduled_at"),
                    level: row.get("level_id"),
                    subject: row.get("subject_id"),
                    status: row.get("status"),
                    lookup_code: row.get("lookup_code"),
                    notes: row.get("notes"),
                    created_at: row.get("created_at"),
                },
                requester_name: row.get("full_name"),
                curp: row.get("curp"),
                office_name: row.get("office_name"),
            })
            .collect())
    }

    pub async fn count_tickets_by_status(
        &self,
    ) -> Result<Vec<(Status, i64)>, Error> {
        const SQL: &str = "\
            SELECT status, COUNT(*) AS total \
            FROM tickets \
            GROUP BY status";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| (row.get("status"), row.get("total")))
            .collect())
    }

    pub async fn count_tickets_by_municipality(
        &self,
    ) -> Result<Vec<(String, Status, i64)>, Error> {
        const SQL: &str = "\
            SELECT m.name, t.status, COUNT(*) AS total \
            FROM tickets t \
            JOIN offices o ON o.id = t.office_id \
            JOIN municipalities m ON m.id = o.municipality_id \
            GROUP BY m.name, t.status \
            ORDER BY m.name, t.status";
        Ok(self
            .0
            .get()
            .await?
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| {
                (row.get("name"), row.get("status"), row.get("total"))
            })
            .collect())
    }
}
