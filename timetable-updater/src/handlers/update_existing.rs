use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::UpdateContext;
use crate::domain::{FeedScopedId, PickDrop, RealTimeState, StopPattern, TripPattern};
use crate::error::{UpdateError, UpdateErrorKind, UpdateWarning};
use crate::pattern_cache::PatternRequest;
use crate::resolve::{ResolvedExistingTrip, ResolvedStopTimeUpdate};
use crate::schedule::StaticSchedule;
use crate::snapshot::RealTimeTripUpdate;
use crate::update::{
    StopCancellationTracking, StopReplacementConstraint, StopSequence, StopUpdateStrategy,
    TripUpdateOptions, UnknownStopBehavior,
};

use super::AppliedUpdate;
use super::stop_times::{apply_stop_update, complete_times, has_times};

/// New times for a scheduled trip, always computed from its scheduled
/// times so that replaying an update gives the same result.
pub fn handle_update_existing(
    resolved: ResolvedExistingTrip<'_>,
    ctx: &UpdateContext<'_>,
) -> Result<AppliedUpdate, UpdateError> {
    let update = resolved.update;
    let options = update.options();
    let trip_id = &resolved.trip.id;
    let scheduled = &resolved.scheduled_pattern;
    let num_stops = scheduled.num_stops();

    let mut warnings = Vec::new();
    let matched = match_stop_updates(&resolved.stop_updates, scheduled, options, &mut warnings);

    let mut skipped: BTreeSet<usize> = update
        .stop_pattern_modification()
        .map(|m| m.skipped_stop_indices.iter().copied().filter(|&i| i < num_stops).collect())
        .unwrap_or_default();
    skipped.extend(
        matched
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_some_and(|u| u.is_skipped()))
            .map(|(i, _)| i),
    );

    if skipped.len() == num_stops {
        debug!(trip = %trip_id, date = %resolved.service_date, "All stops skipped, cancelling trip");
        let cancelled = RealTimeTripUpdate::new(
            Arc::clone(scheduled),
            resolved.scheduled_times.cancelled(),
            resolved.service_date,
        )
        .with_revert_previous()
        .with_producer(update.data_source());
        return Ok(AppliedUpdate::new(cancelled).with_warnings(warnings));
    }

    let stop_pattern = updated_stop_pattern(ctx.schedule, scheduled, &matched, &skipped, options, trip_id)?;
    let pattern_changed = &stop_pattern != scheduled.stop_pattern();

    let mut builder = resolved.scheduled_times.builder_without_times();
    let mut first_updated = None;
    for (i, u) in matched.iter().enumerate() {
        if let Some(u) = u {
            apply_stop_update(&mut builder, i, u);
            if first_updated.is_none() && has_times(u) {
                first_updated = Some(i);
            }
        }
    }
    for &i in &skipped {
        builder.set_cancelled(i);
    }
    complete_times(&mut builder, options, first_updated);

    let state = match options.stop_cancellation_tracking {
        StopCancellationTracking::MarkModifiedOnPatternChange if pattern_changed => RealTimeState::Modified,
        _ => RealTimeState::Updated,
    };
    builder.set_state(state);
    let times = builder
        .build()
        .map_err(|e| UpdateError::from_times(trip_id, e))?;

    let real_time_update = if pattern_changed {
        let lookup = ctx.pattern_cache.get_or_create(
            ctx.schedule,
            PatternRequest {
                route: scheduled.route(),
                mode: scheduled.mode(),
                direction: scheduled.direction(),
                stop_pattern,
                original: Some(scheduled),
            },
        );
        RealTimeTripUpdate::new(lookup.pattern, times, resolved.service_date)
            .with_delete_from(Arc::clone(scheduled))
    } else {
        RealTimeTripUpdate::new(Arc::clone(scheduled), times, resolved.service_date)
    };

    Ok(AppliedUpdate::new(
        real_time_update
            .with_revert_previous()
            .with_producer(update.data_source()),
    )
    .with_warnings(warnings))
}

/// Pair each pattern stop with the update for it, if any.
///
/// Under the full strategy updates are positional. Under the partial
/// strategy an update is placed by its explicit position, by visit number,
/// or by the next occurrence of its stop; updates that cannot be placed
/// are dropped with a warning.
fn match_stop_updates<'a, 'u>(
    stop_updates: &'a [ResolvedStopTimeUpdate<'u>],
    pattern: &TripPattern,
    options: &TripUpdateOptions,
    warnings: &mut Vec<UpdateWarning>,
) -> Vec<Option<&'a ResolvedStopTimeUpdate<'u>>> {
    let num_stops = pattern.num_stops();
    let mut matched = vec![None; num_stops];

    if options.stop_update_strategy == StopUpdateStrategy::Full {
        for (slot, u) in matched.iter_mut().zip(stop_updates) {
            *slot = Some(u);
        }
        return matched;
    }

    let mut cursor = 0;
    for u in stop_updates {
        let index = match u.parsed.sequence {
            Some(StopSequence::Position(position)) => Some(position),
            Some(StopSequence::VisitNumber(visit)) => u.stop_id().and_then(|stop| {
                pattern
                    .stop_pattern()
                    .stops()
                    .enumerate()
                    .filter(|(_, s)| *s == stop)
                    .nth((visit as usize).saturating_sub(1))
                    .map(|(i, _)| i)
            }),
            None => u
                .stop_id()
                .and_then(|stop| (cursor..num_stops).find(|&i| pattern.stop(i) == stop)),
        };
        match index {
            Some(i) if i < num_stops => {
                matched[i] = Some(u);
                cursor = i + 1;
            }
            Some(i) => {
                warn!(index = i, pattern = %pattern.id(), "Stop sequence out of bounds, skipping stop update");
                warnings.push(UpdateWarning::StopSequenceOutOfBounds);
            }
            None => {
                warn!(stop = ?u.parsed.stop.primary_id(), pattern = %pattern.id(), "Stop update matches no stop in pattern, skipping");
            }
        }
    }
    matched
}

/// The scheduled stop pattern with replaced stops swapped in and skipped
/// stops closed for boarding and alighting.
fn updated_stop_pattern(
    schedule: &StaticSchedule,
    scheduled: &TripPattern,
    matched: &[Option<&ResolvedStopTimeUpdate<'_>>],
    skipped: &BTreeSet<usize>,
    options: &TripUpdateOptions,
    trip_id: &FeedScopedId,
) -> Result<StopPattern, UpdateError> {
    let mut entries = scheduled.stop_pattern().entries().to_vec();

    for (i, u) in matched.iter().enumerate() {
        let Some(u) = u else { continue };
        let Some(stop) = u.stop_id() else {
            if options.unknown_stop_behavior == UnknownStopBehavior::Fail {
                return Err(UpdateError::at_stop(Some(trip_id), UpdateErrorKind::UnknownStop, i));
            }
            continue;
        };
        if stop == &entries[i].stop {
            continue;
        }
        let allowed = options.allow_stop_pattern_modification
            && match options.stop_replacement_constraint {
                StopReplacementConstraint::AnyStop => true,
                StopReplacementConstraint::SameParentStation => {
                    schedule.is_same_or_sibling(stop, &entries[i].stop)
                }
                StopReplacementConstraint::NotAllowed => false,
            };
        if !allowed {
            debug!(trip = %trip_id, index = i, expected = %entries[i].stop, got = %stop, "Stop replacement rejected");
            return Err(UpdateError::at_stop(Some(trip_id), UpdateErrorKind::StopMismatch, i));
        }
        entries[i].stop = stop.clone();
    }

    if options.allow_stop_pattern_modification {
        for &i in skipped {
            entries[i].pickup = PickDrop::Cancelled;
            entries[i].dropoff = PickDrop::Cancelled;
        }
    }
    Ok(StopPattern::new(entries))
}
