//! The unit of work handed from the handlers to the buffer.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{Route, Trip, TripOnServiceDate, TripPattern, TripTimes};

/// A trip created in real time, registered alongside its times.
#[derive(Debug, Clone)]
pub struct AddedTrip {
    pub trip: Arc<Trip>,
    pub pattern: Arc<TripPattern>,
    pub dated_trip: TripOnServiceDate,
    /// Baseline times, kept only when added trips include scheduled data.
    pub scheduled_times: Option<TripTimes>,
    /// True if the trip's route was created for it.
    pub route_created: bool,
}

impl AddedTrip {
    pub fn route(&self) -> &Arc<Route> {
        &self.trip.route
    }

    pub fn service_date(&self) -> NaiveDate {
        self.dated_trip.service_date
    }
}

/// New times for one trip on one date, and where to put them.
///
/// Applying it runs three phases in order: revert the trip to its
/// scheduled pattern (if `revert_previous`), tombstone it on `delete_from`
/// (if set), then write `trip_times` into `pattern`.
#[derive(Debug, Clone)]
pub struct RealTimeTripUpdate {
    pattern: Arc<TripPattern>,
    trip_times: TripTimes,
    service_date: NaiveDate,
    revert_previous: bool,
    delete_from: Option<Arc<TripPattern>>,
    added_trip: Option<AddedTrip>,
    producer: Option<String>,
}

impl RealTimeTripUpdate {
    pub fn new(pattern: Arc<TripPattern>, trip_times: TripTimes, service_date: NaiveDate) -> Self {
        Self {
            pattern,
            trip_times,
            service_date,
            revert_previous: false,
            delete_from: None,
            added_trip: None,
            producer: None,
        }
    }

    /// Undo earlier pattern moves of this trip before applying.
    pub fn with_revert_previous(mut self) -> Self {
        self.revert_previous = true;
        self
    }

    /// Tombstone the trip on this pattern before applying.
    pub fn with_delete_from(mut self, pattern: Arc<TripPattern>) -> Self {
        self.delete_from = Some(pattern);
        self
    }

    pub fn with_added_trip(mut self, added: AddedTrip) -> Self {
        self.added_trip = Some(added);
        self
    }

    pub fn with_producer(mut self, producer: Option<&str>) -> Self {
        self.producer = producer.map(str::to_string);
        self
    }

    pub fn pattern(&self) -> &Arc<TripPattern> {
        &self.pattern
    }

    pub fn trip_times(&self) -> &TripTimes {
        &self.trip_times
    }

    pub fn service_date(&self) -> NaiveDate {
        self.service_date
    }

    pub fn revert_previous(&self) -> bool {
        self.revert_previous
    }

    pub fn delete_from(&self) -> Option<&Arc<TripPattern>> {
        self.delete_from.as_ref()
    }

    pub fn added_trip(&self) -> Option<&AddedTrip> {
        self.added_trip.as_ref()
    }

    pub fn producer(&self) -> Option<&str> {
        self.producer.as_deref()
    }

    pub(crate) fn into_parts(self) -> UpdateParts {
        UpdateParts {
            pattern: self.pattern,
            trip_times: self.trip_times,
            service_date: self.service_date,
            revert_previous: self.revert_previous,
            delete_from: self.delete_from,
            added_trip: self.added_trip,
        }
    }
}

pub(crate) struct UpdateParts {
    pub pattern: Arc<TripPattern>,
    pub trip_times: TripTimes,
    pub service_date: NaiveDate,
    pub revert_previous: bool,
    pub delete_from: Option<Arc<TripPattern>>,
    pub added_trip: Option<AddedTrip>,
}
