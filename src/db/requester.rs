use std::{error::Error as StdError, str::FromStr};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};

use super::{Error, Tx};

/// A citizen on record. Identified by CURP; every new submission with
/// the same CURP overwrites the mutable fields (last submission wins).
#[derive(Clone, Debug)]
pub struct Requester {
    pub id: Id,
    pub curp: Curp,
    pub fields: Fields,
    pub registered_at: OffsetDateTime,
}

/// The mutable part of a [`Requester`], as submitted by the public form.
#[derive(Clone, Debug, PartialEq)]
pub struct Fields {
    /// Name of the person doing the paperwork, which is not necessarily
    /// the applicant.
    pub full_name: String,
    pub given_name: String,
    pub paternal_surname: String,
    pub maternal_surname: Option<String>,
    pub phone: Option<String>,
    pub mobile: String,
    pub email: Option<String>,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq,
    Serialize,
)]
pub struct Id(i32);

impl From<i32> for Id {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl FromSql<'_> for Id {
    accepts!(INT4);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        i32::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(INT4);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

/// An 18-character national-ID string, uppercased and shape-checked at
/// the boundary.
#[derive(Clone, Debug, Display, Eq, Hash, PartialEq)]
pub struct Curp(String);

impl Curp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Curp {
    type Err = InvalidCurp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        if s.len() == 18 && s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(s))
        } else {
            Err(InvalidCurp)
        }
    }
}

#[derive(Clone, Copy, Debug, Display)]
#[display("CURP must be 18 alphanumeric characters")]
pub struct InvalidCurp;

impl StdError for InvalidCurp {}

impl FromSql<'_> for Curp {
    accepts!(TEXT, VARCHAR);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Curp {
    accepts!(TEXT, VARCHAR);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

impl Tx<'_> {
    pub async fn write_requester(
        &self,
        curp: &Curp,
        fields: &Fields,
    ) -> Result<Id, Error> {
        const SQL: &str = "\
            INSERT INTO requesters (curp, full_name, given_name, \
                                    paternal_surname, maternal_surname, \
                                    phone, mobile, email) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
            ON CONFLICT (curp) DO UPDATE \
            SET full_name = EXCLUDED.full_name, \
                given_name = EXCLUDED.given_name, \
                paternal_surname = EXCLUDED.paternal_surname, \
                maternal_surname = EXCLUDED.maternal_surname, \
                phone = EXCLUDED.phone, \
                mobile = EXCLUDED.mobile, \
                email = EXCLUDED.email \
            RETURNING id";
        Ok(self
            .0
            .query_one(
                SQL,
                &[
                    curp,
                    &fields.full_name,
                    &fields.given_name,
                    &fields.paternal_surname,
                    &fields.maternal_surname,
                    &fields.phone,
                    &fields.mobile,
                    &fields.email,
                ],
            )
            .await?
            .get("id"))
    }

    pub async fn set_requester_fields(
        &self,
        id: Id,
        fields: &Fields,
    ) -> Result<u64, Error> {
        const SQL: &str = "\
            UPDATE requesters \
            SET full_name = $2, given_name = $3, paternal_surname = $4, \
                maternal_surname = $5, phone = $6, mobile = $7, \
                email = $8 \
            WHERE id = $1";
        Ok(self
            .0
            .execute(
                SQL,
                &[
                    &id,
                    &fields.full_name,
                    &fields.given_name,
                    &fields.paternal_surname,
                    &fields.maternal_surname,
                    &fields.phone,
                    &fields.mobile,
                    &fields.email,
                ],
            )
            .await?)
    }
}
