//! The mutable working copy of real-time timetables.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::{FeedScopedId, Route, TripPattern, TripTimes};

use super::real_time_update::{AddedTrip, RealTimeTripUpdate};
use super::published::TimetableSnapshot;
use super::timetable::{Timetable, TimetableKey};

/// Contract violations when writing into the buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Trip times do not fit the target pattern
    #[error("trip {trip_id} has {times_stops} stops but pattern {pattern_id} has {pattern_stops}")]
    StopCountMismatch {
        trip_id: FeedScopedId,
        pattern_id: FeedScopedId,
        pattern_stops: usize,
        times_stops: usize,
    },
}

/// Trip id and service date.
type TripKey = (FeedScopedId, NaiveDate);

/// All real-time state accumulated since the last snapshot.
///
/// Timetables are reference-counted: a published snapshot and the buffer
/// share every timetable until the buffer writes to one, at which point the
/// buffer takes a private copy. Snapshots therefore never see later writes.
#[derive(Debug, Clone, Default)]
pub struct TimetableBuffer {
    timetables: HashMap<TimetableKey, Arc<Timetable>>,
    dynamic_patterns: HashMap<TripKey, Arc<TripPattern>>,
    added_trips: HashMap<TripKey, Arc<AddedTrip>>,
    added_routes: HashMap<FeedScopedId, Arc<Route>>,
    dirty: bool,
}

impl TimetableBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if anything changed since the last snapshot.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn timetable(&self, pattern_id: &FeedScopedId, date: NaiveDate) -> Option<&Arc<Timetable>> {
        self.timetables.get(&(pattern_id.clone(), date))
    }

    /// Current times of a trip on a pattern and date: real-time if any
    /// were written, else scheduled.
    pub fn trip_times<'a>(
        &'a self,
        pattern: &'a TripPattern,
        date: NaiveDate,
        trip_id: &FeedScopedId,
    ) -> Option<&'a TripTimes> {
        lookup_trip_times(&self.timetables, pattern, date, trip_id)
    }

    /// The pattern a trip was moved to on a date, if it was moved.
    pub fn dynamic_pattern(&self, trip_id: &FeedScopedId, date: NaiveDate) -> Option<&Arc<TripPattern>> {
        self.dynamic_patterns.get(&(trip_id.clone(), date))
    }

    pub fn added_trip(&self, trip_id: &FeedScopedId, date: NaiveDate) -> Option<&Arc<AddedTrip>> {
        self.added_trips.get(&(trip_id.clone(), date))
    }

    pub fn added_route(&self, route_id: &FeedScopedId) -> Option<&Arc<Route>> {
        self.added_routes.get(route_id)
    }

    /// Apply one update in three ordered phases: revert, delete from
    /// scheduled, apply.
    ///
    /// Reverting first matters when a trip moves straight from one dynamic
    /// pattern to another: the old dynamic pattern loses the trip, the
    /// scheduled pattern gets the tombstone, and only then does the new
    /// pattern receive the times.
    pub fn apply(&mut self, update: RealTimeTripUpdate) -> Result<(), BufferError> {
        if update.pattern().num_stops() != update.trip_times().num_stops() {
            return Err(BufferError::StopCountMismatch {
                trip_id: update.trip_times().trip_id().clone(),
                pattern_id: update.pattern().id().clone(),
                pattern_stops: update.pattern().num_stops(),
                times_stops: update.trip_times().num_stops(),
            });
        }

        let parts = update.into_parts();
        let trip_id = parts.trip_times.trip_id().clone();
        let date = parts.service_date;

        if parts.revert_previous {
            self.revert_to_scheduled(&trip_id, date);
        }
        if let Some(origin) = &parts.delete_from {
            self.delete_from_scheduled(origin, &trip_id, date);
        }

        self.write(&parts.pattern, date, parts.trip_times);
        if parts.pattern.is_created_by_real_time() {
            self.dynamic_patterns
                .insert((trip_id.clone(), date), Arc::clone(&parts.pattern));
        }

        if let Some(added) = parts.added_trip {
            if added.route_created {
                self.added_routes
                    .insert(added.route().id.clone(), Arc::clone(added.route()));
            }
            self.added_trips.insert((trip_id, date), Arc::new(added));
        }

        self.dirty = true;
        Ok(())
    }

    /// Remove a trip from the dynamic pattern it was moved to, if any.
    fn revert_to_scheduled(&mut self, trip_id: &FeedScopedId, date: NaiveDate) -> bool {
        let Some(pattern) = self.dynamic_patterns.remove(&(trip_id.clone(), date)) else {
            return false;
        };
        if let Some(timetable) = self.timetables.get_mut(&(pattern.id().clone(), date)) {
            Arc::make_mut(timetable).remove(trip_id);
        }
        debug!(trip = %trip_id, %date, pattern = %pattern.id(), "Reverted trip to scheduled pattern");
        self.dirty = true;
        true
    }

    /// Tombstone a trip on a pattern using its scheduled times there.
    fn delete_from_scheduled(&mut self, pattern: &Arc<TripPattern>, trip_id: &FeedScopedId, date: NaiveDate) -> bool {
        let Some(scheduled) = pattern.scheduled_trip_times(trip_id) else {
            warn!(trip = %trip_id, pattern = %pattern.id(), "No scheduled times to tombstone");
            return false;
        };
        let deleted = scheduled.deleted();
        self.write(pattern, date, deleted);
        true
    }

    fn write(&mut self, pattern: &Arc<TripPattern>, date: NaiveDate, times: TripTimes) {
        let timetable = self
            .timetables
            .entry((pattern.id().clone(), date))
            .or_insert_with(|| Arc::new(Timetable::scheduled(Arc::clone(pattern), date)));
        Arc::make_mut(timetable).set(times);
    }

    /// Drop all real-time state.
    pub fn clear(&mut self) {
        let had_data = !self.timetables.is_empty() || !self.added_trips.is_empty();
        self.timetables.clear();
        self.dynamic_patterns.clear();
        self.added_trips.clear();
        self.added_routes.clear();
        self.dirty |= had_data;
    }

    /// Drop everything for service dates before `cutoff`. Returns the
    /// number of timetables removed.
    pub fn purge_before(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.timetables.len();
        self.timetables.retain(|(_, date), _| *date >= cutoff);
        self.dynamic_patterns.retain(|(_, date), _| *date >= cutoff);
        self.added_trips.retain(|(_, date), _| *date >= cutoff);
        let purged = before - self.timetables.len();
        if purged > 0 {
            self.dirty = true;
        }
        purged
    }

    /// Publish the current state as an immutable snapshot.
    pub(crate) fn freeze(&mut self, generation: u64) -> TimetableSnapshot {
        self.dirty = false;
        TimetableSnapshot::new(
            generation,
            self.timetables.clone(),
            self.dynamic_patterns.clone(),
            self.added_trips.clone(),
            self.added_routes.clone(),
        )
    }
}

pub(crate) fn lookup_trip_times<'a>(
    timetables: &'a HashMap<TimetableKey, Arc<Timetable>>,
    pattern: &'a TripPattern,
    date: NaiveDate,
    trip_id: &FeedScopedId,
) -> Option<&'a TripTimes> {
    match timetables.get(&(pattern.id().clone(), date)) {
        Some(timetable) => timetable.get(trip_id),
        None => pattern.scheduled_trip_times(trip_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RealTimeState, StopPattern, Trip, TripOnServiceDate};
    use crate::test_support::{Network, date, hms, id};

    fn pattern(network: &Network, pattern_id: &str) -> Arc<TripPattern> {
        Arc::clone(network.schedule.pattern(&id(pattern_id)).unwrap())
    }

    fn delayed(pattern: &TripPattern, trip: &str, delay: i32) -> TripTimes {
        let mut builder = pattern.scheduled_trip_times(&id(trip)).unwrap().real_time_builder();
        for stop in 0..builder.num_stops() {
            builder.set_arrival_delay(stop, delay);
            builder.set_departure_delay(stop, delay);
        }
        builder.set_state(RealTimeState::Updated);
        builder.build().unwrap()
    }

    /// P1 without B, as a modification of P1.
    fn skipping_b(p1: &Arc<TripPattern>) -> Arc<TripPattern> {
        Arc::new(TripPattern::real_time(
            id("P1:rt"),
            Arc::clone(p1.route()),
            p1.mode(),
            p1.direction(),
            StopPattern::from_stops([id("A"), id("C")]),
            Some(Arc::clone(p1)),
        ))
    }

    fn two_stop_times(trip: &str) -> TripTimes {
        TripTimes::scheduled(
            id(trip),
            vec![hms(10, 0, 0), hms(11, 5, 0)],
            vec![hms(10, 0, 0), hms(11, 5, 0)],
        )
        .unwrap()
    }

    #[test]
    fn write_copies_scheduled_timetable() {
        let network = Network::abc();
        let p1 = pattern(&network, "P1");
        let mut buffer = TimetableBuffer::new();
        assert!(!buffer.is_dirty());

        let times = delayed(&p1, "T1", 120);
        buffer
            .apply(RealTimeTripUpdate::new(Arc::clone(&p1), times, date()))
            .unwrap();

        assert!(buffer.is_dirty());
        let timetable = buffer.timetable(&id("P1"), date()).unwrap();
        assert_eq!(timetable.len(), 2);
        assert_eq!(timetable.get(&id("T1")).unwrap().arrival(1), hms(10, 32, 0));
        assert_eq!(timetable.get(&id("T2")).unwrap().state(), RealTimeState::Scheduled);
        // Other dates still read the schedule
        let tomorrow = date().succ_opt().unwrap();
        assert_eq!(buffer.trip_times(&p1, tomorrow, &id("T1")).unwrap().arrival(1), hms(10, 30, 0));
    }

    #[test]
    fn stop_count_mismatch_is_rejected() {
        let network = Network::abc();
        let p1 = pattern(&network, "P1");
        let p2 = pattern(&network, "P2");
        let mut buffer = TimetableBuffer::new();

        let err = buffer
            .apply(RealTimeTripUpdate::new(p2, delayed(&p1, "T1", 0), date()))
            .unwrap_err();
        assert_eq!(
            err,
            BufferError::StopCountMismatch {
                trip_id: id("T1"),
                pattern_id: id("P2"),
                pattern_stops: 2,
                times_stops: 3,
            }
        );
        assert!(!buffer.is_dirty());
        assert!(buffer.timetable(&id("P2"), date()).is_none());
    }

    #[test]
    fn moving_trip_tombstones_scheduled_pattern() {
        let network = Network::abc();
        let p1 = pattern(&network, "P1");
        let modified = skipping_b(&p1);
        let mut buffer = TimetableBuffer::new();

        buffer
            .apply(
                RealTimeTripUpdate::new(Arc::clone(&modified), two_stop_times("T1"), date())
                    .with_revert_previous()
                    .with_delete_from(Arc::clone(&p1)),
            )
            .unwrap();

        let scheduled = buffer.trip_times(&p1, date(), &id("T1")).unwrap();
        assert_eq!(scheduled.state(), RealTimeState::Deleted);
        assert_eq!(buffer.trip_times(&modified, date(), &id("T1")).unwrap().arrival(1), hms(11, 5, 0));
        assert_eq!(buffer.dynamic_pattern(&id("T1"), date()).unwrap().id(), &id("P1:rt"));
    }

    #[test]
    fn revert_moves_trip_back() {
        let network = Network::abc();
        let p1 = pattern(&network, "P1");
        let modified = skipping_b(&p1);
        let mut buffer = TimetableBuffer::new();

        buffer
            .apply(
                RealTimeTripUpdate::new(Arc::clone(&modified), two_stop_times("T1"), date())
                    .with_revert_previous()
                    .with_delete_from(Arc::clone(&p1)),
            )
            .unwrap();
        buffer
            .apply(
                RealTimeTripUpdate::new(Arc::clone(&p1), delayed(&p1, "T1", 60), date())
                    .with_revert_previous(),
            )
            .unwrap();

        assert!(buffer.dynamic_pattern(&id("T1"), date()).is_none());
        assert!(buffer.timetable(&id("P1:rt"), date()).unwrap().get(&id("T1")).is_none());
        let times = buffer.trip_times(&p1, date(), &id("T1")).unwrap();
        assert_eq!(times.state(), RealTimeState::Updated);
        assert_eq!(times.arrival(0), hms(10, 1, 0));
    }

    #[test]
    fn added_trip_registers_created_route() {
        let network = Network::abc();
        let agency = Arc::clone(network.schedule.agency(&id("AG1")).unwrap());
        let route = Arc::new(Route::new(id("R9"), agency, crate::domain::TransitMode::Bus));
        let added_pattern = Arc::new(TripPattern::real_time(
            id("R9:added"),
            Arc::clone(&route),
            route.mode,
            None,
            StopPattern::from_stops([id("A"), id("C")]),
            None,
        ));
        let trip = Arc::new(Trip::new(id("N1"), route, id("N1:service")));
        let added = AddedTrip {
            trip: Arc::clone(&trip),
            pattern: Arc::clone(&added_pattern),
            dated_trip: TripOnServiceDate {
                id: id("N1:20240603"),
                trip,
                service_date: date(),
                replacement_for: Vec::new(),
            },
            scheduled_times: None,
            route_created: true,
        };

        let mut buffer = TimetableBuffer::new();
        buffer
            .apply(
                RealTimeTripUpdate::new(Arc::clone(&added_pattern), two_stop_times("N1"), date())
                    .with_added_trip(added),
            )
            .unwrap();

        assert!(buffer.added_route(&id("R9")).is_some());
        assert_eq!(buffer.added_trip(&id("N1"), date()).unwrap().service_date(), date());
        assert!(buffer.dynamic_pattern(&id("N1"), date()).is_some());
    }

    #[test]
    fn purge_drops_old_dates() {
        let network = Network::abc();
        let p1 = pattern(&network, "P1");
        let tomorrow = date().succ_opt().unwrap();
        let mut buffer = TimetableBuffer::new();
        for day in [date(), tomorrow] {
            buffer
                .apply(RealTimeTripUpdate::new(Arc::clone(&p1), delayed(&p1, "T1", 60), day))
                .unwrap();
        }
        buffer.freeze(1);

        assert_eq!(buffer.purge_before(tomorrow), 1);
        assert!(buffer.is_dirty());
        assert!(buffer.timetable(&id("P1"), date()).is_none());
        assert!(buffer.timetable(&id("P1"), tomorrow).is_some());

        buffer.freeze(2);
        assert_eq!(buffer.purge_before(tomorrow), 0);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn clear_marks_dirty_only_with_data() {
        let network = Network::abc();
        let p1 = pattern(&network, "P1");
        let mut buffer = TimetableBuffer::new();
        buffer.clear();
        assert!(!buffer.is_dirty());

        buffer
            .apply(RealTimeTripUpdate::new(Arc::clone(&p1), delayed(&p1, "T1", 60), date()))
            .unwrap();
        buffer.freeze(1);
        buffer.clear();
        assert!(buffer.is_dirty());
        assert!(buffer.timetable(&id("P1"), date()).is_none());
    }

    #[test]
    fn snapshot_shares_untouched_timetables() {
        let network = Network::abc();
        let p1 = pattern(&network, "P1");
        let p2 = pattern(&network, "P2");
        let mut buffer = TimetableBuffer::new();
        buffer
            .apply(RealTimeTripUpdate::new(Arc::clone(&p1), delayed(&p1, "T1", 60), date()))
            .unwrap();
        buffer
            .apply(RealTimeTripUpdate::new(Arc::clone(&p2), delayed(&p2, "T3", 60), date()))
            .unwrap();
        let first = buffer.freeze(1);

        buffer
            .apply(RealTimeTripUpdate::new(Arc::clone(&p1), delayed(&p1, "T1", 300), date()))
            .unwrap();
        let second = buffer.freeze(2);

        assert!(Arc::ptr_eq(
            first.timetable(&id("P2"), date()).unwrap(),
            second.timetable(&id("P2"), date()).unwrap()
        ));
        // The earlier snapshot does not see the later write
        assert_eq!(first.trip_times(&p1, date(), &id("T1")).unwrap().arrival(0), hms(10, 1, 0));
        assert_eq!(second.trip_times(&p1, date(), &id("T1")).unwrap().arrival(0), hms(10, 5, 0));
    }

    #[test]
    fn error_display() {
        let err = BufferError::StopCountMismatch {
            trip_id: id("T1"),
            pattern_id: id("P2"),
            pattern_stops: 2,
            times_stops: 3,
        };
        assert_eq!(err.to_string(), "trip F:T1 has 3 stops but pattern F:P2 has 2");
    }
}
