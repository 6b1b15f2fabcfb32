pub mod common;

use time::macros::{datetime, time};
use turnero::{
    booking::{self, lifecycle, Route},
    db::{
        requester::Curp,
        schedule::Weekday,
        ticket::{Status, Ticket},
    },
};

use common::MemStore;

async fn store_with_issued_ticket() -> (MemStore, Ticket, Curp) {
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Monday,
        time!(09:00),
        time!(12:00),
        50,
    );
    let curp = common::curp('A');
    let ticket = booking::issue_ticket(
        &store,
        datetime!(2026-08-10 08:00),
        &common::request(1, curp.clone()),
    )
    .await
    .unwrap();
    (store, ticket, curp)
}

#[tokio::test]
async fn lookup_returns_the_full_snapshot() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    let snapshot = lifecycle::find_by_lookup(&store, ticket.number, &curp)
        .await
        .unwrap();

    assert_eq!(snapshot.ticket.id, ticket.id);
    assert_eq!(snapshot.ticket.number, ticket.number);
    assert_eq!(snapshot.requester.curp, curp);
    assert_eq!(snapshot.requester.fields.given_name, "Maria");
}

#[tokio::test]
async fn lookup_with_wrong_curp_is_not_eligible() {
    let (store, ticket, _) = store_with_issued_ticket().await;

    let err =
        lifecycle::find_by_lookup(&store, ticket.number, &common::curp('B'))
            .await
            .unwrap_err();

    assert!(matches!(err, booking::Error::NotEligible));
}

#[tokio::test]
async fn lookup_with_wrong_number_is_not_eligible() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    let err = lifecycle::find_by_lookup(&store, ticket.number + 1, &curp)
        .await
        .unwrap_err();

    assert!(matches!(err, booking::Error::NotEligible));
}

#[tokio::test]
async fn pending_ticket_can_be_cancelled() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    lifecycle::cancel_by_lookup(&store, ticket.number, &curp)
        .await
        .unwrap();

    assert_eq!(store.tickets()[0].status, Status::Cancelled);
}

#[tokio::test]
async fn cancelling_twice_reports_failure() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    lifecycle::cancel_by_lookup(&store, ticket.number, &curp)
        .await
        .unwrap();
    let err = lifecycle::cancel_by_lookup(&store, ticket.number, &curp)
        .await
        .unwrap_err();

    assert!(matches!(err, booking::Error::NotEligible));
    assert_eq!(store.tickets()[0].status, Status::Cancelled);
}

#[tokio::test]
async fn resolved_ticket_cannot_be_cancelled() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    lifecycle::resolve(&store, ticket.id).await.unwrap();
    let err = lifecycle::cancel_by_lookup(&store, ticket.number, &curp)
        .await
        .unwrap_err();

    assert!(matches!(err, booking::Error::NotEligible));
    assert_eq!(store.tickets()[0].status, Status::Resolved);
}

#[tokio::test]
async fn admin_can_resolve_and_reopen() {
    let (store, ticket, _) = store_with_issued_ticket().await;

    lifecycle::resolve(&store, ticket.id).await.unwrap();
    assert_eq!(store.tickets()[0].status, Status::Resolved);

    lifecycle::reopen(&store, ticket.id).await.unwrap();
    assert_eq!(store.tickets()[0].status, Status::Pending);
}

#[tokio::test]
async fn cancelled_is_terminal() {
    let (store, ticket, _) = store_with_issued_ticket().await;

    lifecycle::cancel(&store, ticket.id).await.unwrap();

    let err = lifecycle::resolve(&store, ticket.id).await.unwrap_err();
    assert!(matches!(err, booking::Error::NotEligible));
    let err = lifecycle::reopen(&store, ticket.id).await.unwrap_err();
    assert!(matches!(err, booking::Error::NotEligible));
    assert_eq!(store.tickets()[0].status, Status::Cancelled);
}

#[tokio::test]
async fn resolving_twice_reports_failure() {
    let (store, ticket, _) = store_with_issued_ticket().await;

    lifecycle::resolve(&store, ticket.id).await.unwrap();
    let err = lifecycle::resolve(&store, ticket.id).await.unwrap_err();

    assert!(matches!(err, booking::Error::NotEligible));
    assert_eq!(store.tickets()[0].status, Status::Resolved);
}

#[tokio::test]
async fn edit_changes_routing_and_contact_but_never_the_slot() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    let changes = lifecycle::Changes {
        route: Route {
            office: 1.into(),
            level: 2.into(),
            subject: 3.into(),
        },
        requester: {
            let mut fields = common::fields("5599999999");
            fields.email = None;
            fields
        },
    };
    let snapshot =
        lifecycle::edit_by_lookup(&store, ticket.number, &curp, &changes)
            .await
            .unwrap();

    assert_eq!(snapshot.ticket.level, 2.into());
    assert_eq!(snapshot.ticket.subject, 3.into());
    assert_eq!(snapshot.requester.fields.mobile, "5599999999");
    assert_eq!(snapshot.requester.fields.email, None);
    // The assigned slot and folio survive every edit.
    assert_eq!(snapshot.ticket.number, ticket.number);
    assert_eq!(snapshot.ticket.scheduled_on, ticket.scheduled_on);
    assert_eq!(snapshot.ticket.scheduled_at, ticket.scheduled_at);
    assert_eq!(snapshot.requester.curp, curp);
}

#[tokio::test]
async fn only_pending_tickets_can_be_edited() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    lifecycle::resolve(&store, ticket.id).await.unwrap();

    let changes = lifecycle::Changes {
        route: Route {
            office: 1.into(),
            level: 1.into(),
            subject: 1.into(),
        },
        requester: common::fields("5599999999"),
    };
    let err =
        lifecycle::edit_by_lookup(&store, ticket.number, &curp, &changes)
            .await
            .unwrap_err();

    assert!(matches!(err, booking::Error::NotEligible));
}

#[tokio::test]
async fn edit_with_blank_contact_is_rejected() {
    let (store, ticket, curp) = store_with_issued_ticket().await;

    let changes = lifecycle::Changes {
        route: Route {
            office: 1.into(),
            level: 1.into(),
            subject: 1.into(),
        },
        requester: common::fields(""),
    };
    let err =
        lifecycle::edit_by_lookup(&store, ticket.number, &curp, &changes)
            .await
            .unwrap_err();

    assert!(matches!(err, booking::Error::MissingField("mobile")));
    assert_eq!(store.tickets()[0].level, 1.into());
}
