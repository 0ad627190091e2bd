//! Structural checks run between resolution and handling.
//!
//! Validation only reads the resolved bundle. Anything that fails here
//! never reaches a handler, so the buffer is untouched.

use tracing::debug;

use crate::context::UpdateContext;
use crate::domain::FeedScopedId;
use crate::error::{UpdateError, UpdateErrorKind};
use crate::resolve::{ResolvedExistingTrip, ResolvedNewTrip, ResolvedStopTimeUpdate};
use crate::update::{
    StopReplacementConstraint, StopSequence, StopUpdateStrategy, UnknownStopBehavior,
};

/// Every stop update must name a stop.
fn check_stop_references(
    stop_updates: &[ResolvedStopTimeUpdate<'_>],
    trip_id: &FeedScopedId,
) -> Result<(), UpdateError> {
    match stop_updates.iter().position(|u| u.parsed.stop.is_empty()) {
        Some(index) => Err(UpdateError::at_stop(
            Some(trip_id),
            UpdateErrorKind::EmptyStopPointRef,
            index,
        )),
        None => Ok(()),
    }
}

/// Positions and visit numbers cannot be mixed, and a partial update must
/// position all of its stops or none of them.
fn check_sequences(
    stop_updates: &[ResolvedStopTimeUpdate<'_>],
    strategy: StopUpdateStrategy,
    trip_id: &FeedScopedId,
) -> Result<(), UpdateError> {
    let mut positions = 0;
    let mut visits = 0;
    for u in stop_updates {
        match u.parsed.sequence {
            Some(StopSequence::Position(_)) => positions += 1,
            Some(StopSequence::VisitNumber(_)) => visits += 1,
            None => {}
        }
    }
    if positions > 0 && visits > 0 {
        return Err(UpdateError::for_trip(
            trip_id,
            UpdateErrorKind::MixedCallOrderAndVisitNumber,
        ));
    }
    let sequenced = positions + visits;
    if strategy == StopUpdateStrategy::Partial && sequenced > 0 && sequenced < stop_updates.len() {
        return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::MissingCallOrder));
    }
    Ok(())
}

/// Under the fail policy the first unknown stop is an error.
fn check_unknown_stops(
    stop_updates: &[ResolvedStopTimeUpdate<'_>],
    behavior: UnknownStopBehavior,
    trip_id: &FeedScopedId,
) -> Result<(), UpdateError> {
    if behavior == UnknownStopBehavior::Ignore {
        return Ok(());
    }
    match stop_updates.iter().position(|u| u.stop.is_none()) {
        Some(index) => {
            debug!(trip = %trip_id, index, "Unknown stop in update");
            Err(UpdateError::at_stop(Some(trip_id), UpdateErrorKind::UnknownStop, index))
        }
        None => Ok(()),
    }
}

fn check_known_stop_count(
    stop_updates: &[ResolvedStopTimeUpdate<'_>],
    trip_id: &FeedScopedId,
) -> Result<(), UpdateError> {
    if stop_updates.iter().filter(|u| u.stop.is_some()).count() < 2 {
        return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::TooFewStops));
    }
    Ok(())
}

/// Checks for an update to a scheduled trip. Under the full strategy the
/// update must have exactly one entry per scheduled stop.
pub fn validate_existing(resolved: &ResolvedExistingTrip<'_>) -> Result<(), UpdateError> {
    let trip_id = &resolved.trip.id;
    let options = resolved.update.options();
    check_stop_references(&resolved.stop_updates, trip_id)?;
    check_sequences(&resolved.stop_updates, options.stop_update_strategy, trip_id)?;

    if options.stop_update_strategy == StopUpdateStrategy::Full {
        let expected = resolved.scheduled_pattern.num_stops();
        let given = resolved.stop_updates.len();
        if given < expected {
            return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::TooFewStops));
        }
        if given > expected {
            return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::TooManyStops));
        }
    }
    Ok(())
}

/// Checks for a trip running a different stop pattern.
///
/// Under the same-station constraint every stop that is not an extra call
/// must line up, in order, with the scheduled stop at that position or one
/// sharing its station.
pub fn validate_modify(
    resolved: &ResolvedExistingTrip<'_>,
    ctx: &UpdateContext<'_>,
) -> Result<(), UpdateError> {
    let trip_id = &resolved.trip.id;
    let options = resolved.update.options();
    check_stop_references(&resolved.stop_updates, trip_id)?;
    check_sequences(&resolved.stop_updates, options.stop_update_strategy, trip_id)?;

    if !options.allow_stop_pattern_modification
        || options.stop_replacement_constraint == StopReplacementConstraint::NotAllowed
    {
        return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::InvalidStopSequence));
    }
    check_unknown_stops(&resolved.stop_updates, options.unknown_stop_behavior, trip_id)?;

    if options.stop_replacement_constraint == StopReplacementConstraint::SameParentStation {
        let scheduled = &resolved.scheduled_pattern;
        let mut position = 0;
        for (index, u) in resolved.stop_updates.iter().enumerate() {
            if u.parsed.extra_call {
                continue;
            }
            if position >= scheduled.num_stops() {
                return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::InvalidStopSequence));
            }
            let matches = u
                .stop_id()
                .is_some_and(|stop| ctx.schedule.is_same_or_sibling(stop, scheduled.stop(position)));
            if !matches {
                return Err(UpdateError::at_stop(
                    Some(trip_id),
                    UpdateErrorKind::StopMismatch,
                    index,
                ));
            }
            position += 1;
        }
        if position != scheduled.num_stops() {
            return Err(UpdateError::for_trip(trip_id, UpdateErrorKind::InvalidStopSequence));
        }
    }

    check_known_stop_count(&resolved.stop_updates, trip_id)
}

/// Checks for a trip not in the schedule.
pub fn validate_new_trip(resolved: &ResolvedNewTrip<'_>) -> Result<(), UpdateError> {
    let trip_id = &resolved.creation.trip_id;
    let options = resolved.update.options();
    check_stop_references(&resolved.stop_updates, trip_id)?;
    check_sequences(&resolved.stop_updates, options.stop_update_strategy, trip_id)?;
    check_unknown_stops(&resolved.stop_updates, options.unknown_stop_behavior, trip_id)?;
    check_known_stop_count(&resolved.stop_updates, trip_id)
}
