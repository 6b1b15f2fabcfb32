pub mod common;

use time::macros::{date, datetime, time};
use turnero::{
    booking::{self, slot::round_up_to_slot},
    db::schedule::Weekday,
};

use common::MemStore;

#[test]
fn rounding_is_idempotent_on_grid() {
    let aligned = datetime!(2026-08-10 09:30);
    assert_eq!(round_up_to_slot(aligned), Some(aligned));

    let midnight = datetime!(2026-08-10 00:00);
    assert_eq!(round_up_to_slot(midnight), Some(midnight));
}

#[test]
fn rounding_advances_to_next_boundary() {
    assert_eq!(
        round_up_to_slot(datetime!(2026-08-10 09:31)),
        Some(datetime!(2026-08-10 10:00)),
    );
    assert_eq!(
        round_up_to_slot(datetime!(2026-08-10 08:01)),
        Some(datetime!(2026-08-10 08:30)),
    );
}

#[test]
fn rounding_truncates_seconds_first() {
    // 09:00:45 is already on the grid once seconds are dropped.
    assert_eq!(
        round_up_to_slot(datetime!(2026-08-10 09:00:45)),
        Some(datetime!(2026-08-10 09:00)),
    );
}

#[test]
fn rounding_crosses_midnight() {
    assert_eq!(
        round_up_to_slot(datetime!(2026-08-10 23:45)),
        Some(datetime!(2026-08-11 00:00)),
    );
}

#[tokio::test]
async fn office_without_hours_has_no_slots() {
    let store = MemStore::new().with_office(1, 1);

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 08:00),
    )
    .await
    .unwrap();

    assert_eq!(slot, None);
}

#[tokio::test]
async fn first_request_gets_the_opening_slot() {
    // Monday hours 09:00-10:00, request on Monday at 08:00.
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Monday,
        time!(09:00),
        time!(10:00),
        1,
    );

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 08:00),
    )
    .await
    .unwrap();

    assert_eq!(slot, Some((date!(2026-08-10), time!(09:00))));
}

#[tokio::test]
async fn next_free_slot_follows_an_occupied_one() {
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Monday,
        time!(09:00),
        time!(10:00),
        2,
    );
    booking::issue_ticket(
        &store,
        datetime!(2026-08-10 08:00),
        &common::request(1, common::curp('A')),
    )
    .await
    .unwrap();

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 08:00),
    )
    .await
    .unwrap();

    assert_eq!(slot, Some((date!(2026-08-10), time!(09:30))));
}

#[tokio::test]
async fn day_at_capacity_is_skipped() {
    // Capacity 1: one booked ticket fills Monday, the scan moves on to
    // the next configured Monday even though 09:30 is still free.
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Monday,
        time!(09:00),
        time!(10:00),
        1,
    );
    booking::issue_ticket(
        &store,
        datetime!(2026-08-10 08:00),
        &common::request(1, common::curp('A')),
    )
    .await
    .unwrap();

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 08:00),
    )
    .await
    .unwrap();

    assert_eq!(slot, Some((date!(2026-08-17), time!(09:00))));
}

#[tokio::test]
async fn zero_capacity_day_never_books() {
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Monday,
        time!(09:00),
        time!(10:00),
        0,
    );

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 08:00),
    )
    .await
    .unwrap();

    assert_eq!(slot, None);
}

#[tokio::test]
async fn day_is_skipped_once_past_the_last_bookable_slot() {
    // Tuesday 09:00-09:30 has exactly one slot, at 09:00. At 09:35
    // that slot is in the past, so the scan jumps a week ahead.
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Tuesday,
        time!(09:00),
        time!(09:30),
        50,
    );

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-11 09:35),
    )
    .await
    .unwrap();

    assert_eq!(slot, Some((date!(2026-08-18), time!(09:00))));
}

#[tokio::test]
async fn window_shorter_than_one_slot_is_never_bookable() {
    // Closing 15 minutes after opening leaves no room for a whole
    // slot: last bookable (08:45) precedes opening.
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Monday,
        time!(09:00),
        time!(09:15),
        50,
    );

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 07:00),
    )
    .await
    .unwrap();

    assert_eq!(slot, None);
}

#[tokio::test]
async fn same_day_scan_starts_at_rounded_now_inside_hours() {
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Monday,
        time!(08:00),
        time!(12:00),
        50,
    );

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 09:47),
    )
    .await
    .unwrap();

    assert_eq!(slot, Some((date!(2026-08-10), time!(10:00))));
}

#[tokio::test]
async fn future_days_start_at_opening_time() {
    // Only Friday is configured; a Monday request lands on Friday at
    // the opening slot, not at the rounded request time.
    let store = MemStore::new().with_office(1, 1).with_hours(
        1,
        Weekday::Friday,
        time!(10:00),
        time!(14:00),
        50,
    );

    let slot = booking::find_next_slot(
        &store,
        1.into(),
        datetime!(2026-08-10 16:12),
    )
    .await
    .unwrap();

    assert_eq!(slot, Some((date!(2026-08-14), time!(10:00))));
}
