use serde::{Deserialize, Serialize};
use time::Time;

use crate::db;

pub use crate::db::schedule::Weekday;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Municipality {
    pub id: db::municipality::Id,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: db::level::Id,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: db::subject::Id,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Office {
    pub id: db::office::Id,
    pub name: String,
    pub municipality: Municipality,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hours {
    pub id: db::schedule::Id,
    pub office: db::office::Id,
    pub weekday: Weekday,
    pub opens_at: Time,
    pub closes_at: Time,
    pub max_tickets: i16,
}

impl From<db::WeeklyHours> for Hours {
    fn from(hours: db::WeeklyHours) -> Self {
        Self {
            id: hours.id,
            office: hours.office,
            weekday: hours.weekday,
            opens_at: hours.opens_at,
            closes_at: hours.closes_at,
            max_tickets: hours.max_tickets,
        }
    }
}
