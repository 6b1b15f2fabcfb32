use super::{issue::validate_fields, Error, Route, Store};
use crate::db::{
    requester::{Curp, Fields},
    ticket::{self, Snapshot, Status},
};

/// Public lookup by folio number + CURP. Returns the full snapshot or
/// [`Error::NotEligible`].
pub async fn find_by_lookup<S>(
    store: &S,
    number: i32,
    curp: &Curp,
) -> Result<Snapshot, Error>
where
    S: Store + ?Sized,
{
    store
        .ticket_by_number(number, curp)
        .await?
        .ok_or(Error::NotEligible)
}

/// What a public edit may change: the routing of the turno and the
/// requester's contact fields. Never the slot, the folio, or the CURP.
#[derive(Clone, Debug)]
pub struct Changes {
    pub route: Route,
    pub requester: Fields,
}

/// Public edit: only pending tickets are editable.
pub async fn edit_by_lookup<S>(
    store: &S,
    number: i32,
    curp: &Curp,
    changes: &Changes,
) -> Result<Snapshot, Error>
where
    S: Store + ?Sized,
{
    validate_fields(&changes.requester)?;

    let snapshot = find_by_lookup(store, number, curp).await?;
    if snapshot.ticket.status != Status::Pending {
        return Err(Error::NotEligible);
    }

    store
        .update_requester(snapshot.requester.id, &changes.requester)
        .await?;
    if !store
        .update_ticket_route(snapshot.ticket.id, &changes.route, Status::Pending)
        .await?
    {
        return Err(Error::NotEligible);
    }

    find_by_lookup(store, number, curp).await
}

/// Public cancel: only pending tickets can be cancelled, and failing
/// that is reported, not crashed.
pub async fn cancel_by_lookup<S>(
    store: &S,
    number: i32,
    curp: &Curp,
) -> Result<(), Error>
where
    S: Store + ?Sized,
{
    let snapshot = find_by_lookup(store, number, curp).await?;
    transition(store, snapshot.ticket.id, Status::Pending, Status::Cancelled)
        .await
}

/// Admin: marks a pending ticket as attended.
pub async fn resolve<S>(store: &S, id: ticket::Id) -> Result<(), Error>
where
    S: Store + ?Sized,
{
    transition(store, id, Status::Pending, Status::Resolved).await
}

/// Admin: sends a resolved ticket back to pending.
pub async fn reopen<S>(store: &S, id: ticket::Id) -> Result<(), Error>
where
    S: Store + ?Sized,
{
    transition(store, id, Status::Resolved, Status::Pending).await
}

/// Admin cancel. Like the public one, only reachable from pending:
/// cancelled is terminal and resolved tickets must be reopened first.
pub async fn cancel<S>(store: &S, id: ticket::Id) -> Result<(), Error>
where
    S: Store + ?Sized,
{
    transition(store, id, Status::Pending, Status::Cancelled).await
}

async fn transition<S>(
    store: &S,
    id: ticket::Id,
    from: Status,
    to: Status,
) -> Result<(), Error>
where
    S: Store + ?Sized,
{
    if store.update_ticket_status(id, from, to).await? {
        Ok(())
    } else {
        Err(Error::NotEligible)
    }
}
