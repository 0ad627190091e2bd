//! Per-stop time arithmetic shared by the handlers.

use std::sync::Arc;

use crate::domain::{
    FeedScopedId, PickDrop, RealTimeTripTimesBuilder, StopPattern, StopPatternEntry, TripPattern,
    TripTimes,
};
use crate::error::{UpdateError, UpdateErrorKind};
use crate::resolve::ResolvedStopTimeUpdate;
use crate::update::{
    BackwardsDelayPropagation, FirstLastStopTimeAdjustment, ForwardsDelayPropagation, StopUpdateStatus,
    TimeUpdate, TripUpdateOptions,
};

/// Write an update's explicit times and flags into stop `i`.
///
/// An arrival later than the scheduled departure pushes the departure, and
/// a departure earlier than the scheduled arrival pulls the arrival. Other
/// missing times are left unset for propagation to fill.
pub(crate) fn apply_stop_update(
    builder: &mut RealTimeTripTimesBuilder,
    i: usize,
    update: &ResolvedStopTimeUpdate<'_>,
) {
    let parsed = update.parsed;
    if parsed.is_skipped() {
        builder.set_cancelled(i);
    }
    if parsed.recorded {
        builder.set_recorded(i);
    }
    if parsed.prediction_inaccurate {
        builder.set_inaccurate(i);
    }
    if let Some(headsign) = &parsed.headsign {
        builder.set_stop_headsign(i, headsign.clone());
    }
    if let Some(occupancy) = parsed.occupancy {
        builder.set_occupancy(i, occupancy);
    }
    if parsed.status == StopUpdateStatus::NoData {
        builder.set_no_data(i);
        return;
    }

    let arrival = update
        .arrival
        .filter(TimeUpdate::has_data)
        .map(|t| t.resolve_time(builder.scheduled_arrival(i)));
    let departure = update
        .departure
        .filter(TimeUpdate::has_data)
        .map(|t| t.resolve_time(builder.scheduled_departure(i)));

    if let Some(arrival) = arrival {
        builder.set_arrival(i, arrival);
        if departure.is_none() && arrival > builder.scheduled_departure(i) {
            builder.set_departure(i, arrival);
        }
    }
    if let Some(departure) = departure {
        builder.set_departure(i, departure);
        if arrival.is_none() && departure < builder.scheduled_arrival(i) {
            builder.set_arrival(i, departure);
        }
    }
}

/// True if the update gives an arrival or departure time.
pub(crate) fn has_times(update: &ResolvedStopTimeUpdate<'_>) -> bool {
    update.parsed.status != StopUpdateStatus::NoData
        && (update.arrival.is_some_and(|t| t.has_data())
            || update.departure.is_some_and(|t| t.has_data()))
}

/// Carry the latest known delay to every later unset time.
fn propagate_forwards(builder: &mut RealTimeTripTimesBuilder) {
    let mut delay: Option<i32> = None;
    let mut previous_departure: Option<i32> = None;
    for i in 0..builder.num_stops() {
        match builder.arrival(i) {
            Some(arrival) => delay = Some(arrival - builder.scheduled_arrival(i)),
            None => {
                if let Some(d) = delay {
                    let mut arrival = builder.scheduled_arrival(i) + d;
                    if let Some(previous) = previous_departure {
                        arrival = arrival.max(previous);
                    }
                    if let Some(departure) = builder.departure(i) {
                        arrival = arrival.min(departure);
                    }
                    builder.set_arrival(i, arrival);
                }
            }
        }
        match builder.departure(i) {
            Some(departure) => delay = Some(departure - builder.scheduled_departure(i)),
            None => {
                if let Some(d) = delay {
                    let arrival = builder.arrival(i).unwrap_or(i32::MIN);
                    builder.set_departure(i, (builder.scheduled_departure(i) + d).max(arrival));
                }
            }
        }
        previous_departure = builder.departure(i);
    }
}

/// Fill the stops before `first`, the first stop with real-time times.
fn propagate_backwards(
    builder: &mut RealTimeTripTimesBuilder,
    first: usize,
    policy: BackwardsDelayPropagation,
) {
    match policy {
        BackwardsDelayPropagation::None => {}
        BackwardsDelayPropagation::Always => {
            let delay = builder
                .arrival(first)
                .map(|a| a - builder.scheduled_arrival(first))
                .or_else(|| builder.departure(first).map(|d| d - builder.scheduled_departure(first)))
                .unwrap_or(0);
            for i in 0..first {
                builder.set_arrival_delay(i, delay);
                builder.set_departure_delay(i, delay);
            }
        }
        BackwardsDelayPropagation::Required | BackwardsDelayPropagation::RequiredNoData => {
            for i in (0..first).rev() {
                let next = builder
                    .arrival(i + 1)
                    .or_else(|| builder.departure(i + 1))
                    .unwrap_or_else(|| builder.scheduled_arrival(i + 1));
                let departure = builder.scheduled_departure(i).min(next);
                let arrival = builder.scheduled_arrival(i).min(departure);
                builder.set_departure(i, departure);
                builder.set_arrival(i, arrival);
                if policy == BackwardsDelayPropagation::RequiredNoData {
                    builder.set_no_data(i);
                }
            }
        }
    }
}

/// Propagate, fill what is still missing from the schedule and align the
/// ends of the trip if asked to.
///
/// `first_updated` is the first stop whose update carried times.
pub(crate) fn complete_times(
    builder: &mut RealTimeTripTimesBuilder,
    options: &TripUpdateOptions,
    first_updated: Option<usize>,
) {
    if options.forwards_propagation == ForwardsDelayPropagation::Default {
        propagate_forwards(builder);
    }
    if let Some(first) = first_updated {
        propagate_backwards(builder, first, options.backwards_propagation);
    }
    builder.copy_missing_times_from_schedule();

    if options.first_last_stop_time_adjustment == FirstLastStopTimeAdjustment::Adjust {
        if let Some(departure) = builder.departure(0) {
            builder.set_arrival(0, departure);
        }
        let last = builder.num_stops() - 1;
        if let Some(arrival) = builder.arrival(last) {
            builder.set_departure(last, arrival);
        }
    }
}

/// One stop of a trip whose stop pattern comes from the update itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call<'a, 'u> {
    pub update: &'a ResolvedStopTimeUpdate<'u>,
    pub stop: &'a FeedScopedId,
    /// Position of the same call in the baseline pattern, if it has one.
    pub baseline_index: Option<usize>,
}

/// A stop pattern and times built from a list of calls.
#[derive(Debug)]
pub(crate) struct CallTimes {
    pub stop_pattern: StopPattern,
    pub builder: RealTimeTripTimesBuilder,
    pub first_updated: Option<usize>,
}

/// A baseline the calls are matched against: the scheduled pattern of a
/// modified trip, or the current pattern of a trip added earlier.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Baseline<'a> {
    pub pattern: &'a Arc<TripPattern>,
    pub times: &'a TripTimes,
}

/// Build the stop pattern and times of a trip from its calls.
///
/// The planned time of a call is the producer's aimed time, else the
/// baseline time of the same call, else the updated time. A call with no
/// arrival at all arrives when the previous call departed.
pub(crate) fn build_calls(
    trip_id: &FeedScopedId,
    calls: &[Call<'_, '_>],
    baseline: Option<Baseline<'_>>,
) -> Result<CallTimes, UpdateError> {
    let last = calls.len().saturating_sub(1);
    let mut entries = Vec::with_capacity(calls.len());
    let mut scheduled_arrivals = Vec::with_capacity(calls.len());
    let mut scheduled_departures = Vec::with_capacity(calls.len());
    let mut previous_departure: Option<i32> = None;

    for (k, call) in calls.iter().enumerate() {
        let parsed = call.update.parsed;
        let original = baseline.zip(call.baseline_index);

        let original_entry = original.map(|(b, j)| b.pattern.stop_pattern().entry(j));
        let mut entry = StopPatternEntry::new(call.stop.clone());
        entry.pickup = parsed
            .pickup
            .or(original_entry.map(|e| e.pickup))
            .unwrap_or(if k == last { PickDrop::None } else { PickDrop::Scheduled });
        entry.dropoff = parsed
            .dropoff
            .or(original_entry.map(|e| e.dropoff))
            .unwrap_or(if k == 0 { PickDrop::None } else { PickDrop::Scheduled });
        if parsed.is_skipped() {
            entry.pickup = PickDrop::Cancelled;
            entry.dropoff = PickDrop::Cancelled;
        }
        entries.push(entry);

        let planned_arrival = call
            .update
            .aimed_arrival()
            .or(original.map(|(b, j)| b.times.scheduled_arrival(j)))
            .or(call.update.arrival.and_then(|t| t.time));
        let planned_departure = call
            .update
            .aimed_departure()
            .or(original.map(|(b, j)| b.times.scheduled_departure(j)))
            .or(call.update.departure.and_then(|t| t.time));

        let Some(arrival) = planned_arrival.or(previous_departure).or(planned_departure) else {
            return Err(UpdateError::at_stop(
                Some(trip_id),
                UpdateErrorKind::InvalidInputStructure,
                k,
            ));
        };
        let departure = planned_departure.unwrap_or(arrival);
        scheduled_arrivals.push(arrival);
        scheduled_departures.push(departure);
        previous_departure = Some(departure);
    }

    let mut builder = RealTimeTripTimesBuilder::for_new_schedule(
        trip_id.clone(),
        scheduled_arrivals,
        scheduled_departures,
    )
    .map_err(|e| UpdateError::from_times(trip_id, e))?;

    let mut first_updated = None;
    for (k, call) in calls.iter().enumerate() {
        apply_stop_update(&mut builder, k, call.update);
        if first_updated.is_none() && has_times(call.update) {
            first_updated = Some(k);
        }
    }

    Ok(CallTimes {
        stop_pattern: StopPattern::new(entries),
        builder,
        first_updated,
    })
}
