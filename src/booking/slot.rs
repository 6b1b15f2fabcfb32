use time::{Date, Duration, PrimitiveDateTime, Time};

use super::{Error, Store, HORIZON_DAYS, SLOT_MINUTES};
use crate::db::office;

/// Rounds `now` up to the next multiple of the slot grid.
///
/// Arithmetic is in whole minutes: seconds are truncated first, so an
/// instant already on the grid stays put. Rounding may cross into the
/// next day. `None` only on calendar overflow.
pub fn round_up_to_slot(
    now: PrimitiveDateTime,
) -> Option<PrimitiveDateTime> {
    let minutes = minutes_of(now.time());
    let rounded =
        (minutes + SLOT_MINUTES - 1) / SLOT_MINUTES * SLOT_MINUTES;
    PrimitiveDateTime::new(now.date(), Time::MIDNIGHT)
        .checked_add(Duration::minutes(rounded))
}

/// Finds the earliest free slot of an office, scanning forward from
/// `now` through the configured weekly hours, per-day capacity, and
/// existing ticket occupancy.
///
/// Returns `None` when the scan horizon is exhausted. The occupancy
/// reads are advisory; under concurrency the store's uniqueness
/// guarantee at insert time is the final authority.
pub async fn find_next_slot<S>(
    store: &S,
    office: office::Id,
    now: PrimitiveDateTime,
) -> Result<Option<(Date, Time)>, Error>
where
    S: Store + ?Sized,
{
    let Some(start) = round_up_to_slot(now) else {
        return Ok(None);
    };

    for offset in 0..HORIZON_DAYS {
        let Some(on) = start.date().checked_add(Duration::days(offset))
        else {
            break;
        };

        let Some(hours) =
            store.weekly_hours(office, on.weekday().into()).await?
        else {
            continue; // office closed on this weekday
        };

        if store.booked_count(office, on).await?
            >= i64::from(hours.max_tickets)
        {
            continue; // day already at capacity
        }

        let open = minutes_of(hours.opens_at);
        let last_bookable = minutes_of(hours.closes_at) - SLOT_MINUTES;

        // On the day the rounded "now" falls on, slots before it are in
        // the past; on later days the office opening is the earliest
        // candidate. Never start before opening either way.
        let mut candidate = if on == start.date() {
            open.max(minutes_of(start.time()))
        } else {
            open
        };

        if candidate > last_bookable {
            continue; // nothing fits before closing anymore
        }

        while candidate <= last_bookable {
            let Some(at) = time_at(candidate) else {
                break;
            };
            if !store.slot_taken(office, on, at).await? {
                return Ok(Some((on, at)));
            }
            candidate += SLOT_MINUTES;
        }
    }

    Ok(None)
}

fn minutes_of(t: Time) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

fn time_at(minutes: i64) -> Option<Time> {
    let hour = u8::try_from(minutes / 60).ok()?;
    let minute = u8::try_from(minutes % 60).ok()?;
    Time::from_hms(hour, minute, 0).ok()
}
