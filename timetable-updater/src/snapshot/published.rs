//! Immutable point-in-time views of the buffer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{FeedScopedId, Route, TripPattern, TripTimes};

use super::buffer::lookup_trip_times;
use super::real_time_update::AddedTrip;
use super::timetable::{Timetable, TimetableKey};

/// A published, read-only view of real-time timetables.
///
/// Cheap to clone behind an `Arc` and safe to read from any number of
/// threads. Later commits never change it.
#[derive(Debug, Default)]
pub struct TimetableSnapshot {
    generation: u64,
    timetables: HashMap<TimetableKey, Arc<Timetable>>,
    dynamic_patterns: HashMap<(FeedScopedId, NaiveDate), Arc<TripPattern>>,
    added_trips: HashMap<(FeedScopedId, NaiveDate), Arc<AddedTrip>>,
    added_routes: HashMap<FeedScopedId, Arc<Route>>,
}

impl TimetableSnapshot {
    pub(crate) fn new(
        generation: u64,
        timetables: HashMap<TimetableKey, Arc<Timetable>>,
        dynamic_patterns: HashMap<(FeedScopedId, NaiveDate), Arc<TripPattern>>,
        added_trips: HashMap<(FeedScopedId, NaiveDate), Arc<AddedTrip>>,
        added_routes: HashMap<FeedScopedId, Arc<Route>>,
    ) -> Self {
        Self {
            generation,
            timetables,
            dynamic_patterns,
            added_trips,
            added_routes,
        }
    }

    /// Zero for the empty snapshot, then one higher per publication.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn timetable(&self, pattern_id: &FeedScopedId, date: NaiveDate) -> Option<&Arc<Timetable>> {
        self.timetables.get(&(pattern_id.clone(), date))
    }

    /// Number of (pattern, date) timetables holding real-time data.
    pub fn len(&self) -> usize {
        self.timetables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timetables.is_empty()
    }

    /// Times of a trip on a pattern and date, falling back to the pattern's
    /// scheduled times when nothing real-time was published.
    pub fn trip_times<'a>(
        &'a self,
        pattern: &'a TripPattern,
        date: NaiveDate,
        trip_id: &FeedScopedId,
    ) -> Option<&'a TripTimes> {
        lookup_trip_times(&self.timetables, pattern, date, trip_id)
    }

    pub fn dynamic_pattern(&self, trip_id: &FeedScopedId, date: NaiveDate) -> Option<&Arc<TripPattern>> {
        self.dynamic_patterns.get(&(trip_id.clone(), date))
    }

    pub fn added_trip(&self, trip_id: &FeedScopedId, date: NaiveDate) -> Option<&Arc<AddedTrip>> {
        self.added_trips.get(&(trip_id.clone(), date))
    }

    pub fn added_route(&self, route_id: &FeedScopedId) -> Option<&Arc<Route>> {
        self.added_routes.get(route_id)
    }

    /// Service dates with real-time data, ascending.
    pub fn service_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.timetables.keys().map(|(_, date)| *date).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}
