pub mod counter;
pub mod level;
pub mod municipality;
pub mod office;
pub mod requester;
pub mod schedule;
pub mod subject;
pub mod ticket;

use std::error::Error as StdError;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use derive_more::{Display, From};
use time::{Date, Time};
use tokio_postgres::{error::SqlState, NoTls};

use crate::{booking, config};

pub use self::{
    office::Office, requester::Requester, schedule::WeeklyHours,
    ticket::Ticket,
};

pub fn connect(config: config::Db) -> Result<Client, Error> {
    let pg_config = config.url.parse::<tokio_postgres::Config>()?;
    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(manager)
        .max_size(config.pool_size)
        .build()?;
    Ok(Client(pool))
}

pub struct Client(Pool);

impl Client {
    pub async fn conn(&self) -> Result<Conn, Error> {
        Ok(Conn(self.0.get().await?))
    }
}

pub struct Conn(deadpool_postgres::Object);

impl Conn {
    pub async fn begin(&mut self) -> Result<Tx<'_>, Error> {
        Ok(Tx(self.0.transaction().await?))
    }
}

/// A single database transaction. Dropping it without [`Tx::commit`]
/// rolls everything back.
pub struct Tx<'a>(deadpool_postgres::Transaction<'a>);

impl Tx<'_> {
    pub async fn commit(self) -> Result<(), Error> {
        Ok(self.0.commit().await?)
    }
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("database error: {_0}")]
    #[from]
    Postgres(tokio_postgres::Error),

    #[display("connection pool error: {_0}")]
    #[from]
    Pool(deadpool_postgres::PoolError),

    #[display("connection pool cannot be built: {_0}")]
    #[from]
    Build(deadpool_postgres::BuildError),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Postgres(e) => Some(e),
            Self::Pool(e) => Some(e),
            Self::Build(e) => Some(e),
        }
    }
}

impl Error {
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::UNIQUE_VIOLATION)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
    }

    pub fn constraint(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => {
                e.as_db_error().and_then(|detail| detail.constraint())
            }
            Self::Pool(_) | Self::Build(_) => None,
        }
    }

    fn sql_state(&self) -> Option<&SqlState> {
        match self {
            Self::Postgres(e) => e.code(),
            Self::Pool(_) | Self::Build(_) => None,
        }
    }
}

impl From<Error> for booking::Error {
    fn from(e: Error) -> Self {
        if e.is_unique_violation() {
            match e.constraint() {
                Some("uq_tickets_slot") => return Self::SlotTaken,
                Some("uq_tickets_open_requester") => {
                    return Self::DuplicateRequest
                }
                _ => {}
            }
        }
        if e.is_foreign_key_violation() {
            return Self::InvalidReference;
        }
        Self::Store(Box::new(e))
    }
}

#[async_trait]
impl booking::Store for Tx<'_> {
    async fn weekly_hours(
        &self,
        office: office::Id,
        weekday: schedule::Weekday,
    ) -> Result<Option<WeeklyHours>, booking::Error> {
        Ok(self.get_hours_for_weekday(office, weekday).await?)
    }

    async fn booked_count(
        &self,
        office: office::Id,
        on: Date,
    ) -> Result<i64, booking::Error> {
        Ok(self.count_tickets_for_day(office, on).await?)
    }

    async fn slot_taken(
        &self,
        office: office::Id,
        on: Date,
        at: Time,
    ) -> Result<bool, booking::Error> {
        Ok(self.is_slot_taken(office, on, at).await?)
    }

    async fn office_by_id(
        &self,
        id: office::Id,
    ) -> Result<Option<Office>, booking::Error> {
        Ok(self.get_office_by_id(id).await?)
    }

    async fn upsert_requester(
        &self,
        curp: &requester::Curp,
        fields: &requester::Fields,
    ) -> Result<requester::Id, booking::Error> {
        Ok(self.write_requester(curp, fields).await?)
    }

    async fn update_requester(
        &self,
        id: requester::Id,
        fields: &requester::Fields,
    ) -> Result<(), booking::Error> {
        self.set_requester_fields(id, fields).await?;
        Ok(())
    }

    async fn next_folio(
        &self,
        municipality: municipality::Id,
    ) -> Result<i32, booking::Error> {
        Ok(self.increment_counter(municipality).await?)
    }

    async fn insert_ticket(
        &self,
        ticket: &Ticket,
    ) -> Result<(), booking::Error> {
        Ok(self.write_ticket(ticket).await?)
    }

    async fn ticket_by_number(
        &self,
        number: i32,
        curp: &requester::Curp,
    ) -> Result<Option<ticket::Snapshot>, booking::Error> {
        Ok(self.get_ticket_by_number(number, curp).await?)
    }

    async fn update_ticket_status(
        &self,
        id: ticket::Id,
        from: ticket::Status,
        to: ticket::Status,
    ) -> Result<bool, booking::Error> {
        Ok(self.set_ticket_status(id, from, to).await? == 1)
    }

    async fn update_ticket_route(
        &self,
        id: ticket::Id,
        route: &booking::Route,
        from: ticket::Status,
    ) -> Result<bool, booking::Error> {
        Ok(self
            .set_ticket_route(
                id,
                route.office,
                route.level,
                route.subject,
                from,
            )
            .await?
            == 1)
    }
}
