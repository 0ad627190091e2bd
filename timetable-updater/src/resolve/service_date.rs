use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::domain::day_offset;
use crate::error::{UpdateError, UpdateErrorKind};
use crate::schedule::StaticSchedule;
use crate::update::ParsedTripUpdate;

use super::trip::resolve_trip;

/// The service date an update applies to.
///
/// In order of precedence: the explicit date, the date of the referenced
/// dated trip, then the aimed departure time. An aimed departure is shifted
/// back by the whole days in the trip's scheduled first departure, so a
/// trip scheduled at 25:00 and departing at 01:00 belongs to the previous
/// day. Only when the trip cannot be resolved is the departure's own
/// calendar date used.
pub fn resolve_service_date(
    update: &ParsedTripUpdate,
    schedule: &StaticSchedule,
) -> Result<NaiveDate, UpdateError> {
    let reference = update.reference();

    if let Some(date) = update.service_date().or(reference.start_date) {
        return Ok(date);
    }

    if let Some(dated_id) = &reference.trip_on_service_date_id {
        return schedule
            .dated_trip(dated_id)
            .map(|dated| dated.service_date)
            .ok_or_else(|| UpdateError::for_trip(dated_id, UpdateErrorKind::TripNotFound));
    }

    if let Some(aimed) = update.aimed_departure_time() {
        let local_date = aimed.with_timezone(&schedule.time_zone()).date_naive();
        let Ok(trip) = resolve_trip(reference, schedule) else {
            debug!(%aimed, "Trip unresolvable, using calendar date of aimed departure");
            return Ok(local_date);
        };
        let offset = schedule
            .pattern_for_trip(&trip.id)
            .and_then(|p| p.scheduled_trip_times(&trip.id))
            .map(|t| day_offset(t.scheduled_first_departure()))
            .unwrap_or(0);
        return Ok(shift_days(local_date, -offset));
    }

    Err(UpdateError::new(update.trip_id().cloned(), UpdateErrorKind::NoStartDate))
}

fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}
