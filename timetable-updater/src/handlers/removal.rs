use std::sync::Arc;

use tracing::debug;

use crate::context::UpdateContext;
use crate::domain::TripTimes;
use crate::error::{UpdateError, UpdateErrorKind};
use crate::resolve::ResolvedTripRemoval;
use crate::snapshot::RealTimeTripUpdate;
use crate::update::UpdateType;

use super::AppliedUpdate;

/// Cancel or delete a whole trip. A scheduled trip is looked for first,
/// then a trip added earlier on the same date.
pub fn handle_removal(
    resolved: ResolvedTripRemoval<'_>,
    ctx: &UpdateContext<'_>,
) -> Result<AppliedUpdate, UpdateError> {
    let update = resolved.update;
    let date = resolved.service_date;
    let mark = |times: &TripTimes| match update.update_type() {
        UpdateType::DeleteTrip => times.deleted(),
        _ => times.cancelled(),
    };

    if let Some(scheduled) = resolved.scheduled {
        debug!(trip = %scheduled.trip.id, %date, kind = %update.update_type(), "Removing scheduled trip");
        let removal = RealTimeTripUpdate::new(scheduled.pattern, mark(&scheduled.scheduled_times), date)
            .with_revert_previous()
            .with_producer(update.data_source());
        return Ok(AppliedUpdate::new(removal));
    }

    if let Some(trip_id) = &resolved.trip_id {
        if let Some(added) = ctx.buffer.added_trip(trip_id, date) {
            if let Some(current) = ctx.buffer.trip_times(&added.pattern, date, trip_id) {
                debug!(trip = %trip_id, %date, kind = %update.update_type(), "Removing added trip");
                let removal = RealTimeTripUpdate::new(Arc::clone(&added.pattern), mark(current), date)
                    .with_producer(update.data_source());
                return Ok(AppliedUpdate::new(removal));
            }
        }
    }

    debug!(trip = ?resolved.trip_id, %date, "No trip found to remove");
    Err(UpdateError::new(
        resolved.trip_id,
        UpdateErrorKind::NoTripForCancellationFound,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RealTimeState;
    use crate::pattern_cache::PatternCache;
    use crate::resolve::resolve_removal;
    use crate::snapshot::{AddedTrip, TimetableBuffer};
    use crate::test_support::{Network, date, hms, id, update};
    use crate::update::ParsedTripUpdate;

    fn handle(network: &Network, buffer: &TimetableBuffer, u: &ParsedTripUpdate) -> Result<AppliedUpdate, UpdateError> {
        let cache = PatternCache::default();
        let ctx = UpdateContext {
            schedule: &network.schedule,
            buffer,
            fuzzy_matcher: None,
            pattern_cache: &cache,
        };
        let resolved = resolve_removal(u, &ctx)?;
        handle_removal(resolved, &ctx)
    }

    #[test]
    fn cancel_and_delete_scheduled_trip() {
        let network = Network::abc();
        let buffer = TimetableBuffer::new();

        let cancelled = handle(&network, &buffer, &update(UpdateType::CancelTrip, "T1", vec![])).unwrap();
        assert_eq!(cancelled.update.trip_times().state(), RealTimeState::Canceled);
        assert_eq!(cancelled.update.pattern().id(), &id("P1"));
        assert!(cancelled.update.revert_previous());

        let deleted = handle(&network, &buffer, &update(UpdateType::DeleteTrip, "T1", vec![])).unwrap();
        assert_eq!(deleted.update.trip_times().state(), RealTimeState::Deleted);
    }

    #[test]
    fn unknown_trip_cannot_be_cancelled() {
        let network = Network::abc();
        let buffer = TimetableBuffer::new();
        let err = handle(&network, &buffer, &update(UpdateType::CancelTrip, "NOPE", vec![])).unwrap_err();
        assert_eq!(err.kind(), UpdateErrorKind::NoTripForCancellationFound);
        assert_eq!(err.trip_id(), Some(&id("NOPE")));
    }

    #[test]
    fn added_trip_is_cancelled_on_its_pattern() {
        let network = Network::abc();
        let mut buffer = TimetableBuffer::new();
        let cache = PatternCache::default();
        let route = Arc::clone(network.schedule.route(&id("R1")).unwrap());
        let trip = Arc::new(crate::domain::Trip::new(id("N1"), Arc::clone(&route), id("S")));
        let pattern = cache
            .get_or_create(
                &network.schedule,
                crate::pattern_cache::PatternRequest {
                    route: &route,
                    mode: route.mode,
                    direction: None,
                    stop_pattern: crate::domain::StopPattern::from_stops([id("C"), id("E")]),
                    original: None,
                },
            )
            .pattern;
        let times = TripTimes::scheduled(id("N1"), vec![hms(16, 0, 0), hms(16, 30, 0)], vec![hms(16, 0, 0), hms(16, 30, 0)]).unwrap();
        let added = AddedTrip {
            trip: Arc::clone(&trip),
            pattern: Arc::clone(&pattern),
            dated_trip: crate::domain::TripOnServiceDate {
                id: id("N1:d"),
                trip,
                service_date: date(),
                replacement_for: Vec::new(),
            },
            scheduled_times: None,
            route_created: false,
        };
        buffer
            .apply(RealTimeTripUpdate::new(Arc::clone(&pattern), times, date()).with_added_trip(added))
            .unwrap();

        let cancelled = handle(&network, &buffer, &update(UpdateType::CancelTrip, "N1", vec![])).unwrap();
        assert!(Arc::ptr_eq(cancelled.update.pattern(), &pattern));
        assert_eq!(cancelled.update.trip_times().state(), RealTimeState::Canceled);
        assert!(!cancelled.update.revert_previous());
    }
}
