use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use time::{Date, OffsetDateTime, Time};
use turnero::{
    booking::{self, Route, Store},
    db::{
        municipality,
        office::{self, Office},
        requester::{self, Curp, Fields, Requester},
        schedule::{Weekday, WeeklyHours},
        ticket::{self, Snapshot, Status, Ticket},
    },
};

/// In-memory [`Store`] the engine tests run against. Mirrors the
/// uniqueness guarantees of the real schema: no two active tickets per
/// slot, at most one pending ticket per requester.
#[derive(Default)]
pub struct MemStore(Mutex<State>);

#[derive(Default)]
struct State {
    offices: HashMap<office::Id, Office>,
    hours: HashMap<(office::Id, Weekday), WeeklyHours>,
    requesters: Vec<Requester>,
    counters: HashMap<municipality::Id, i32>,
    tickets: Vec<Ticket>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_office(self, id: i16, municipality: i16) -> Self {
        {
            let mut state = self.0.lock().unwrap();
            let office = Office {
                id: id.into(),
                name: format!("Office {id}"),
                municipality: municipality.into(),
            };
            state.offices.insert(office.id, office);
        }
        self
    }

    pub fn with_hours(
        self,
        office: i16,
        weekday: Weekday,
        opens_at: Time,
        closes_at: Time,
        max_tickets: i16,
    ) -> Self {
        {
            let mut state = self.0.lock().unwrap();
            let id = i16::try_from(state.hours.len() + 1).unwrap();
            state.hours.insert(
                (office.into(), weekday),
                WeeklyHours {
                    id: id.into(),
                    office: office.into(),
                    weekday,
                    opens_at,
                    closes_at,
                    max_tickets,
                },
            );
        }
        self
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.0.lock().unwrap().tickets.clone()
    }

    pub fn requesters(&self) -> Vec<Requester> {
        self.0.lock().unwrap().requesters.clone()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn weekly_hours(
        &self,
        office: office::Id,
        weekday: Weekday,
    ) -> Result<Option<WeeklyHours>, booking::Error> {
        Ok(self.0.lock().unwrap().hours.get(&(office, weekday)).cloned())
    }

    async fn booked_count(
        &self,
        office: office::Id,
        on: Date,
    ) -> Result<i64, booking::Error> {
        let count = self
            .0
            .lock()
            .unwrap()
            .tickets
            .iter()
            .filter(|t| {
                t.office == office
                    && t.scheduled_on == on
                    && t.status != Status::Cancelled
            })
            .count();
        Ok(count as i64)
    }

    async fn slot_taken(
        &self,
        office: office::Id,
        on: Date,
        at: Time,
    ) -> Result<bool, booking::Error> {
        Ok(self.0.lock().unwrap().tickets.iter().any(|t| {
            t.office == office
                && t.scheduled_on == on
                && t.scheduled_at == at
                && t.status != Status::Cancelled
        }))
    }

    async fn office_by_id(
        &self,
        id: office::Id,
    ) -> Result<Option<Office>, booking::Error> {
        Ok(self.0.lock().unwrap().offices.get(&id).cloned())
    }

    async fn upsert_requester(
        &self,
        curp: &Curp,
        fields: &Fields,
    ) -> Result<requester::Id, booking::Error> {
        let mut state = self.0.lock().unwrap();
        if let Some(existing) =
            state.requesters.iter_mut().find(|r| &r.curp == curp)
        {
            existing.fields = fields.clone();
            return Ok(existing.id);
        }
        let id = requester::Id::from(
            i32::try_from(state.requesters.len() + 1).unwrap(),
        );
        state.requesters.push(Requester {
            id,
            curp: curp.clone(),
            fields: fields.clone(),
            registered_at: OffsetDateTime::now_utc(),
        });
        Ok(id)
    }

    async fn update_requester(
        &self,
        id: requester::Id,
        fields: &Fields,
    ) -> Result<(), booking::Error> {
        let mut state = self.0.lock().unwrap();
        if let Some(requester) =
            state.requesters.iter_mut().find(|r| r.id == id)
        {
            requester.fields = fields.clone();
        }
        Ok(())
    }

    async fn next_folio(
        &self,
        municipality: municipality::Id,
    ) -> Result<i32, booking::Error> {
        let mut state = self.0.lock().unwrap();
        let counter = state.counters.entry(municipality).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_ticket(
        &self,
        ticket: &Ticket,
    ) -> Result<(), booking::Error> {
        let mut state = self.0.lock().unwrap();
        let slot_taken = state.tickets.iter().any(|t| {
            t.office == ticket.office
                && t.scheduled_on == ticket.scheduled_on
                && t.scheduled_at == ticket.scheduled_at
                && t.status != Status::Cancelled
        });
        if slot_taken {
            return Err(booking::Error::SlotTaken);
        }
        let already_open = state.tickets.iter().any(|t| {
            t.requester == ticket.requester && t.status == Status::Pending
        });
        if already_open {
            return Err(booking::Error::DuplicateRequest);
        }
        state.tickets.push(ticket.clone());
        Ok(())
    }

    async fn ticket_by_number(
        &self,
        number: i32,
        curp: &Curp,
    ) -> Result<Option<Snapshot>, booking::Error> {
        let state = self.0.lock().unwrap();
        let Some(requester) =
            state.requesters.iter().find(|r| &r.curp == curp)
        else {
            return Ok(None);
        };
        Ok(state
            .tickets
            .iter()
            .filter(|t| t.number == number && t.requester == requester.id)
            .max_by_key(|t| t.created_at)
            .map(|t| Snapshot {
                ticket: t.clone(),
                requester: requester.clone(),
            }))
    }

    async fn update_ticket_status(
        &self,
        id: ticket::Id,
        from: Status,
        to: Status,
    ) -> Result<bool, booking::Error> {
        let mut state = self.0.lock().unwrap();
        match state
            .tickets
            .iter_mut()
            .find(|t| t.id == id && t.status == from)
        {
            Some(ticket) => {
                ticket.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_ticket_route(
        &self,
        id: ticket::Id,
        route: &Route,
        from: Status,
    ) -> Result<bool, booking::Error> {
        let mut state = self.0.lock().unwrap();
        match state
            .tickets
            .iter_mut()
            .find(|t| t.id == id && t.status == from)
        {
            Some(ticket) => {
                ticket.office = route.office;
                ticket.level = route.level;
                ticket.subject = route.subject;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A valid 18-character CURP-shaped string, varied by `tag` so tests
/// can mint distinct identities.
pub fn curp(tag: char) -> Curp {
    format!("GOMC90010{tag}HDFLRS09").parse().unwrap()
}

pub fn fields(mobile: &str) -> Fields {
    Fields {
        full_name: "Maria Gonzalez Cruz".into(),
        given_name: "Maria".into(),
        paternal_surname: "Gonzalez".into(),
        maternal_surname: Some("Cruz".into()),
        phone: None,
        mobile: mobile.into(),
        email: Some("maria@example.com".into()),
    }
}

pub fn request(office: i16, curp: Curp) -> booking::issue::Request {
    booking::issue::Request {
        route: Route {
            office: office.into(),
            level: 1.into(),
            subject: 1.into(),
        },
        curp,
        requester: fields("5512345678"),
        notes: None,
    }
}
