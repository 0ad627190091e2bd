use std::sync::Arc;

use crate::domain::Trip;
use crate::error::{UpdateError, UpdateErrorKind};
use crate::schedule::StaticSchedule;
use crate::update::TripReference;

/// Look up a scheduled trip by exact reference.
///
/// A trip id outranks a dated-trip id when both are present. An id that is
/// present but unknown is `TRIP_NOT_FOUND`; no id at all is `NO_TRIP_ID`.
pub fn resolve_trip(
    reference: &TripReference,
    schedule: &StaticSchedule,
) -> Result<Arc<Trip>, UpdateError> {
    if let Some(trip_id) = &reference.trip_id {
        return schedule
            .trip(trip_id)
            .cloned()
            .ok_or_else(|| UpdateError::for_trip(trip_id, UpdateErrorKind::TripNotFound));
    }
    if let Some(dated_id) = &reference.trip_on_service_date_id {
        return schedule
            .dated_trip(dated_id)
            .map(|dated| Arc::clone(&dated.trip))
            .ok_or_else(|| UpdateError::for_trip(dated_id, UpdateErrorKind::TripNotFound));
    }
    Err(UpdateError::new(None, UpdateErrorKind::NoTripId))
}
