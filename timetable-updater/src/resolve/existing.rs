use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::context::UpdateContext;
use crate::domain::{Trip, TripOnServiceDate, TripPattern, TripTimes};
use crate::error::{UpdateError, UpdateErrorKind};
use crate::fuzzy::TripAndPattern;
use crate::update::ParsedTripUpdate;

use super::service_date::resolve_service_date;
use super::stop::ResolvedStopTimeUpdate;
use super::trip::resolve_trip;

/// An update to a scheduled trip with everything it refers to looked up.
#[derive(Debug)]
pub struct ResolvedExistingTrip<'u> {
    pub update: &'u ParsedTripUpdate,
    pub service_date: NaiveDate,
    pub trip: Arc<Trip>,
    /// The pattern the trip currently runs on that date, which may be a
    /// real-time modification.
    pub pattern: Arc<TripPattern>,
    /// The static pattern the trip is scheduled on.
    pub scheduled_pattern: Arc<TripPattern>,
    pub scheduled_times: TripTimes,
    pub dated_trip: Option<TripOnServiceDate>,
    pub stop_updates: Vec<ResolvedStopTimeUpdate<'u>>,
}

/// Resolve an UPDATE_EXISTING or MODIFY_TRIP update.
pub fn resolve_existing<'u>(
    update: &'u ParsedTripUpdate,
    ctx: &UpdateContext<'_>,
) -> Result<ResolvedExistingTrip<'u>, UpdateError> {
    let schedule = ctx.schedule;
    let service_date = resolve_service_date(update, schedule)?;

    let found = resolve_trip_and_pattern(update, ctx, service_date)?;
    let TripAndPattern {
        trip,
        pattern,
        service_date,
    } = found;

    if !schedule.is_trip_active(&trip, service_date) {
        debug!(trip = %trip.id, %service_date, "Trip does not run on service date");
        return Err(UpdateError::for_trip(&trip.id, UpdateErrorKind::NoServiceOnDate));
    }

    let scheduled_pattern = match pattern.original_pattern() {
        Some(original) if pattern.is_modified() => Arc::clone(original),
        _ => Arc::clone(&pattern),
    };
    let Some(scheduled_times) = scheduled_pattern.scheduled_trip_times(&trip.id).cloned() else {
        warn!(trip = %trip.id, pattern = %scheduled_pattern.id(), "No trip times in pattern");
        return Err(UpdateError::for_trip(&trip.id, UpdateErrorKind::TripNotFoundInPattern));
    };

    let dated_trip = update
        .reference()
        .trip_on_service_date_id
        .as_ref()
        .and_then(|id| schedule.dated_trip(id))
        .or_else(|| schedule.dated_trip_for(&trip.id, service_date))
        .cloned();

    let stop_updates = ResolvedStopTimeUpdate::resolve_all(
        update.stop_time_updates(),
        schedule,
        service_date,
        schedule.time_zone(),
    );

    Ok(ResolvedExistingTrip {
        update,
        service_date,
        trip,
        pattern,
        scheduled_pattern,
        scheduled_times,
        dated_trip,
        stop_updates,
    })
}

/// Exact lookup first, then fuzzy matching if the reference allows it and
/// a matcher is configured. The pattern is the trip's real-time pattern on
/// the date if it was moved, else its scheduled one.
fn resolve_trip_and_pattern(
    update: &ParsedTripUpdate,
    ctx: &UpdateContext<'_>,
    service_date: NaiveDate,
) -> Result<TripAndPattern, UpdateError> {
    let reference = update.reference();
    let trip = match resolve_trip(reference, ctx.schedule) {
        Ok(trip) => trip,
        Err(err) => {
            return match ctx.fuzzy_matcher {
                Some(matcher) if reference.allows_fuzzy_matching() => {
                    debug!(error = %err, "Exact match failed, trying fuzzy matching");
                    let found = matcher.match_trip(update, service_date)?;
                    Ok(with_current_pattern(found, ctx))
                }
                _ => Err(err),
            };
        }
    };

    let Some(pattern) = ctx.schedule.pattern_for_trip(&trip.id) else {
        warn!(trip = %trip.id, "Trip found but no pattern available");
        return Err(UpdateError::for_trip(&trip.id, UpdateErrorKind::TripNotFoundInPattern));
    };
    Ok(with_current_pattern(
        TripAndPattern {
            pattern: Arc::clone(pattern),
            trip,
            service_date,
        },
        ctx,
    ))
}

fn with_current_pattern(found: TripAndPattern, ctx: &UpdateContext<'_>) -> TripAndPattern {
    match ctx.buffer.dynamic_pattern(&found.trip.id, found.service_date) {
        Some(dynamic) => TripAndPattern {
            pattern: Arc::clone(dynamic),
            ..found
        },
        None => found,
    }
}
