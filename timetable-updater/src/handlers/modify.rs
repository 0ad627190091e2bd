use std::sync::Arc;

use tracing::debug;

use crate::context::UpdateContext;
use crate::domain::RealTimeState;
use crate::error::UpdateError;
use crate::pattern_cache::PatternRequest;
use crate::resolve::ResolvedExistingTrip;
use crate::snapshot::RealTimeTripUpdate;

use super::AppliedUpdate;
use super::stop_times::{Baseline, Call, build_calls, complete_times};

/// A scheduled trip running a different stop pattern.
///
/// Unknown stops have already been rejected or are dropped here. Calls
/// that are not extra calls are matched, in order, to scheduled stops with
/// the same id or station, and keep those stops' planned times.
pub fn handle_modify(
    resolved: ResolvedExistingTrip<'_>,
    ctx: &UpdateContext<'_>,
) -> Result<AppliedUpdate, UpdateError> {
    let update = resolved.update;
    let options = update.options();
    let trip_id = &resolved.trip.id;
    let scheduled = &resolved.scheduled_pattern;

    let mut cursor = 0;
    let calls: Vec<Call<'_, '_>> = resolved
        .stop_updates
        .iter()
        .filter_map(|u| {
            let stop = u.stop_id()?;
            let baseline_index = if u.parsed.extra_call {
                None
            } else {
                let found = (cursor..scheduled.num_stops())
                    .find(|&j| ctx.schedule.is_same_or_sibling(stop, scheduled.stop(j)));
                if let Some(j) = found {
                    cursor = j + 1;
                }
                found
            };
            Some(Call {
                update: u,
                stop,
                baseline_index,
            })
        })
        .collect();
    if calls.len() < resolved.stop_updates.len() {
        debug!(trip = %trip_id, dropped = resolved.stop_updates.len() - calls.len(), "Dropped unknown stops from modified trip");
    }

    let mut built = build_calls(
        trip_id,
        &calls,
        Some(Baseline {
            pattern: scheduled,
            times: &resolved.scheduled_times,
        }),
    )?;
    built
        .builder
        .set_headsign(resolved.scheduled_times.headsign().map(str::to_string));
    complete_times(&mut built.builder, options, built.first_updated);

    let pattern_changed = &built.stop_pattern != scheduled.stop_pattern();
    built.builder.set_state(if pattern_changed {
        RealTimeState::Modified
    } else {
        RealTimeState::Updated
    });
    let times = built
        .builder
        .build()
        .map_err(|e| UpdateError::from_times(trip_id, e))?;

    let lookup = ctx.pattern_cache.get_or_create(
        ctx.schedule,
        PatternRequest {
            route: scheduled.route(),
            mode: scheduled.mode(),
            direction: scheduled.direction(),
            stop_pattern: built.stop_pattern,
            original: Some(scheduled),
        },
    );
    let moved = lookup.pattern.id() != scheduled.id();
    debug!(trip = %trip_id, pattern = %lookup.pattern.id(), reused = lookup.reused, "Modified trip pattern");

    let mut real_time_update = RealTimeTripUpdate::new(lookup.pattern, times, resolved.service_date)
        .with_revert_previous()
        .with_producer(update.data_source());
    if moved {
        real_time_update = real_time_update.with_delete_from(Arc::clone(scheduled));
    }
    Ok(AppliedUpdate::new(real_time_update))
}
