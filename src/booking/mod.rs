//! The slot-assignment engine: finds the next free appointment slot for
//! an office and issues turnos atomically.
//!
//! Everything here runs against the [`Store`] abstraction, so the same
//! code drives the Postgres transaction in production and an in-memory
//! store in tests.

pub mod issue;
pub mod lifecycle;
pub mod slot;

use std::error::Error as StdError;

use async_trait::async_trait;
use derive_more::{Display, From};
use time::{Date, Time};

use crate::db::{
    level, municipality,
    office::{self, Office},
    requester::{self, Curp, Fields, InvalidCurp},
    schedule::{Weekday, WeeklyHours},
    subject,
    ticket::{self, Snapshot, Status, Ticket},
};

pub use self::{issue::issue_ticket, slot::find_next_slot};

/// Appointment slot granularity, in whole minutes. Shared by the
/// rounding and the stepping of the slot finder.
pub const SLOT_MINUTES: i64 = 30;

/// How many calendar days ahead the slot finder scans before giving up.
pub const HORIZON_DAYS: i64 = 30;

/// Storage operations the engine runs against.
///
/// Occupancy reads are advisory: they are performed without locks, and
/// the store's uniqueness guarantees on inserted tickets are the final
/// authority. [`Store::next_folio`] must serialize concurrent callers
/// per municipality.
#[async_trait]
pub trait Store {
    async fn weekly_hours(
        &self,
        office: office::Id,
        weekday: Weekday,
    ) -> Result<Option<WeeklyHours>, Error>;

    /// Number of non-cancelled tickets of an office on a date.
    async fn booked_count(
        &self,
        office: office::Id,
        on: Date,
    ) -> Result<i64, Error>;

    /// Whether a non-cancelled ticket occupies the exact slot.
    async fn slot_taken(
        &self,
        office: office::Id,
        on: Date,
        at: Time,
    ) -> Result<bool, Error>;

    async fn office_by_id(
        &self,
        id: office::Id,
    ) -> Result<Option<Office>, Error>;

    /// Creates the requester or overwrites its mutable fields (last
    /// submission wins), returning its id.
    async fn upsert_requester(
        &self,
        curp: &Curp,
        fields: &Fields,
    ) -> Result<requester::Id, Error>;

    async fn update_requester(
        &self,
        id: requester::Id,
        fields: &Fields,
    ) -> Result<(), Error>;

    /// Locked read-increment of the municipality's folio counter.
    async fn next_folio(
        &self,
        municipality: municipality::Id,
    ) -> Result<i32, Error>;

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), Error>;

    async fn ticket_by_number(
        &self,
        number: i32,
        curp: &Curp,
    ) -> Result<Option<Snapshot>, Error>;

    /// Transitions the ticket's status, only if it currently is `from`.
    /// Returns whether a transition happened.
    async fn update_ticket_status(
        &self,
        id: ticket::Id,
        from: Status,
        to: Status,
    ) -> Result<bool, Error>;

    /// Rewrites the ticket's routing, only if its status currently is
    /// `from`. Returns whether an update happened.
    async fn update_ticket_route(
        &self,
        id: ticket::Id,
        route: &Route,
        from: Status,
    ) -> Result<bool, Error>;
}

/// Where a turno is routed: the office that serves it and what it is
/// about. The only ticket fields a public edit may change.
#[derive(Clone, Copy, Debug)]
pub struct Route {
    pub office: office::Id,
    pub level: level::Id,
    pub subject: subject::Id,
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("no appointment slots available within the booking horizon")]
    NoAvailability,

    #[display("unknown office: {_0}")]
    UnknownOffice(office::Id),

    /// The slot picked by the finder was taken by a concurrent
    /// issuance before this one could commit.
    #[display("the assigned slot was taken by a concurrent request")]
    SlotTaken,

    #[display("an open turno already exists for this CURP")]
    DuplicateRequest,

    #[display("office, level, or subject does not exist")]
    InvalidReference,

    /// Lookup misses and ineligible statuses are deliberately folded
    /// into one message, so callers cannot probe which field was wrong.
    #[display("ticket not found or not eligible")]
    NotEligible,

    #[display("missing required field: {_0}")]
    MissingField(&'static str),

    #[display("{_0}")]
    #[from]
    InvalidCurp(InvalidCurp),

    #[display("storage error: {_0}")]
    #[from]
    Store(Box<dyn StdError + Send + Sync>),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Store(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
