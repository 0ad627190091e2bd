use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::context::UpdateContext;
use crate::domain::TripTimes;
use crate::error::{UpdateError, UpdateErrorKind};
use crate::snapshot::AddedTrip;
use crate::update::{ParsedTripUpdate, TripCreationInfo};

use super::service_date::resolve_service_date;
use super::stop::ResolvedStopTimeUpdate;

/// A trip added earlier in real time, found again.
#[derive(Debug)]
pub struct PreviouslyAddedTrip {
    pub added: Arc<AddedTrip>,
    /// The baseline the trip was created with.
    pub scheduled_times: TripTimes,
}

/// An ADD_NEW_TRIP update, either creating a trip or re-updating one
/// created earlier.
#[derive(Debug)]
pub struct ResolvedNewTrip<'u> {
    pub update: &'u ParsedTripUpdate,
    pub service_date: NaiveDate,
    pub creation: &'u TripCreationInfo,
    pub existing: Option<PreviouslyAddedTrip>,
    pub stop_updates: Vec<ResolvedStopTimeUpdate<'u>>,
}

pub fn resolve_new_trip<'u>(
    update: &'u ParsedTripUpdate,
    ctx: &UpdateContext<'_>,
) -> Result<ResolvedNewTrip<'u>, UpdateError> {
    let service_date = resolve_service_date(update, ctx.schedule)?;

    let Some(creation) = update.trip_creation() else {
        debug!("New trip without creation info");
        return Err(UpdateError::new(update.trip_id().cloned(), UpdateErrorKind::InvalidInputStructure));
    };
    let trip_id = &creation.trip_id;

    if ctx.schedule.trip(trip_id).is_some() {
        debug!(trip = %trip_id, "Trip already exists in the schedule");
        return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::TripAlreadyExists));
    }

    let existing = match ctx.buffer.added_trip(trip_id, service_date) {
        Some(added) => {
            let Some(current) = ctx.buffer.trip_times(&added.pattern, service_date, trip_id) else {
                return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::TripNotFoundInPattern));
            };
            debug!(trip = %trip_id, %service_date, "Trip was added earlier, updating it");
            Some(PreviouslyAddedTrip {
                added: Arc::clone(added),
                scheduled_times: current.scheduled_copy(),
            })
        }
        None => None,
    };

    let stop_updates = ResolvedStopTimeUpdate::resolve_all(
        update.stop_time_updates(),
        ctx.schedule,
        service_date,
        ctx.schedule.time_zone(),
    );

    Ok(ResolvedNewTrip {
        update,
        service_date,
        creation,
        existing,
        stop_updates,
    })
}
