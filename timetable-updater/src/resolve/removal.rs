use std::sync::Arc;

use chrono::NaiveDate;

use crate::context::UpdateContext;
use crate::domain::{FeedScopedId, Trip, TripPattern, TripTimes};
use crate::error::UpdateError;
use crate::update::ParsedTripUpdate;

use super::service_date::resolve_service_date;
use super::trip::resolve_trip;

/// A scheduled trip found for removal.
#[derive(Debug)]
pub struct ScheduledRemoval {
    pub trip: Arc<Trip>,
    pub pattern: Arc<TripPattern>,
    pub scheduled_times: TripTimes,
}

/// A CANCEL_TRIP or DELETE_TRIP update with its service date resolved.
///
/// `scheduled` is `None` when no scheduled trip was found; the trip may
/// still have been added in real time, which the handler checks.
#[derive(Debug)]
pub struct ResolvedTripRemoval<'u> {
    pub update: &'u ParsedTripUpdate,
    pub service_date: NaiveDate,
    pub trip_id: Option<FeedScopedId>,
    pub scheduled: Option<ScheduledRemoval>,
}

/// Resolve a removal. Only exact references are used, never fuzzy ones.
pub fn resolve_removal<'u>(
    update: &'u ParsedTripUpdate,
    ctx: &UpdateContext<'_>,
) -> Result<ResolvedTripRemoval<'u>, UpdateError> {
    let service_date = resolve_service_date(update, ctx.schedule)?;

    let scheduled = resolve_trip(update.reference(), ctx.schedule)
        .ok()
        .and_then(|trip| {
            let pattern = Arc::clone(ctx.schedule.pattern_for_trip(&trip.id)?);
            let scheduled_times = pattern.scheduled_trip_times(&trip.id)?.clone();
            Some(ScheduledRemoval {
                trip,
                pattern,
                scheduled_times,
            })
        });

    let trip_id = scheduled
        .as_ref()
        .map(|s| s.trip.id.clone())
        .or_else(|| update.reference().trip_id.clone());

    Ok(ResolvedTripRemoval {
        update,
        service_date,
        trip_id,
        scheduled,
    })
}
