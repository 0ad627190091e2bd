//! Per-pattern, per-date timetables.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{FeedScopedId, TripPattern, TripTimes};

/// Key of a timetable: pattern id and service date.
pub type TimetableKey = (FeedScopedId, NaiveDate);

/// The trip times of every trip on one pattern for one service date.
///
/// Starts as a copy of the pattern's scheduled times and is edited in
/// place as real-time updates arrive.
#[derive(Debug, Clone)]
pub struct Timetable {
    pattern: Arc<TripPattern>,
    service_date: NaiveDate,
    /// Sorted by trip id.
    trip_times: Vec<TripTimes>,
}

impl Timetable {
    /// The scheduled timetable of a pattern on a date.
    pub fn scheduled(pattern: Arc<TripPattern>, service_date: NaiveDate) -> Self {
        let trip_times = pattern.scheduled_times().to_vec();
        Self {
            pattern,
            service_date,
            trip_times,
        }
    }

    pub fn pattern(&self) -> &Arc<TripPattern> {
        &self.pattern
    }

    pub fn service_date(&self) -> NaiveDate {
        self.service_date
    }

    pub fn trip_times(&self) -> &[TripTimes] {
        &self.trip_times
    }

    pub fn get(&self, trip_id: &FeedScopedId) -> Option<&TripTimes> {
        self.position(trip_id).ok().map(|i| &self.trip_times[i])
    }

    pub fn len(&self) -> usize {
        self.trip_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trip_times.is_empty()
    }

    /// Insert or replace the times of a trip.
    pub(crate) fn set(&mut self, times: TripTimes) {
        match self.position(times.trip_id()) {
            Ok(i) => self.trip_times[i] = times,
            Err(i) => self.trip_times.insert(i, times),
        }
    }

    pub(crate) fn remove(&mut self, trip_id: &FeedScopedId) -> Option<TripTimes> {
        self.position(trip_id).ok().map(|i| self.trip_times.remove(i))
    }

    fn position(&self, trip_id: &FeedScopedId) -> Result<usize, usize> {
        self.trip_times
            .binary_search_by(|t| t.trip_id().cmp(trip_id))
    }
}
