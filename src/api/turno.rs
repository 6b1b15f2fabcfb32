use serde::{Deserialize, Serialize};
use time::{Date, Time};

use crate::api;

pub use crate::db::ticket::{Id, Status, View};

/// The full public view of a turno: everything the confirmation page
/// and the printable receipt show.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Turno {
    pub number: i32,
    pub date: Date,
    pub time: Time,
    pub status: Status,
    pub requester: Requester,
    pub office: api::Office,
    pub level: api::Level,
    pub subject: api::Subject,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub full_name: String,
    pub given_name: String,
    pub paternal_surname: String,
    pub maternal_surname: Option<String>,
    pub curp: String,
    pub phone: Option<String>,
    pub mobile: String,
    pub email: Option<String>,
}

/// One row of the admin listing.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: Id,
    pub number: i32,
    pub date: Date,
    pub time: Time,
    pub status: Status,
    pub requester_name: String,
    pub curp: String,
    pub office: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub totals: StatusCounts,
    pub by_municipality: Vec<MunicipalityStats>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub resolved: i64,
    pub cancelled: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityStats {
    pub municipality: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}
