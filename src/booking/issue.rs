use time::{OffsetDateTime, PrimitiveDateTime};

use super::{find_next_slot, Error, Route, Store};
use crate::db::{
    requester::{Curp, Fields},
    ticket::{self, Status, Ticket},
};

/// A citizen's request for a new turno, as submitted by the public
/// form.
#[derive(Clone, Debug)]
pub struct Request {
    pub route: Route,
    pub curp: Curp,
    pub requester: Fields,
    pub notes: Option<String>,
}

impl Request {
    /// Field-level validation. Runs before any transaction is opened.
    pub fn validate(&self) -> Result<(), Error> {
        validate_fields(&self.requester)
    }
}

pub(super) fn validate_fields(fields: &Fields) -> Result<(), Error> {
    use Error::MissingField as Missing;

    if fields.full_name.trim().is_empty() {
        return Err(Missing("fullName"));
    }
    if fields.given_name.trim().is_empty() {
        return Err(Missing("givenName"));
    }
    if fields.paternal_surname.trim().is_empty() {
        return Err(Missing("paternalSurname"));
    }
    if fields.mobile.trim().is_empty() {
        return Err(Missing("mobile"));
    }
    Ok(())
}

/// Issues a new turno: finds the next free slot, upserts the
/// requester, assigns the next folio of the office's municipality, and
/// inserts the pending ticket.
///
/// Must run inside a single store transaction; any error leaves
/// nothing behind once the caller rolls back. The folio step is the
/// serialization point for concurrent issuances within one
/// municipality, while the slot is only re-validated by the store's
/// uniqueness guarantee at insert time.
pub async fn issue_ticket<S>(
    store: &S,
    now: PrimitiveDateTime,
    request: &Request,
) -> Result<Ticket, Error>
where
    S: Store + ?Sized,
{
    request.validate()?;

    let (on, at) = find_next_slot(store, request.route.office, now)
        .await?
        .ok_or(Error::NoAvailability)?;

    let requester = store
        .upsert_requester(&request.curp, &request.requester)
        .await?;

    let office = store
        .office_by_id(request.route.office)
        .await?
        .ok_or(Error::UnknownOffice(request.route.office))?;

    let number = store.next_folio(office.municipality).await?;

    let ticket = Ticket {
        id: ticket::Id::new(),
        requester,
        office: office.id,
        number,
        scheduled_on: on,
        scheduled_at: at,
        level: request.route.level,
        subject: request.route.subject,
        status: Status::Pending,
        lookup_code: request.curp.to_string(),
        notes: request.notes.clone(),
        created_at: OffsetDateTime::now_utc(),
    };
    store.insert_ticket(&ticket).await?;

    Ok(ticket)
}
