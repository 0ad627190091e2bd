//! In-memory static schedule.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::domain::{
    Agency, CalendarService, FeedScopedId, Route, Station, Stop, Trip, TripOnServiceDate,
    TripPattern,
};

use super::error::ScheduleError;

/// The planned timetable of one feed, indexed for the lookups real-time
/// resolution needs.
///
/// A schedule is immutable once built and is shared behind an `Arc` by the
/// applier, the fuzzy matchers and the snapshot buffer.
#[derive(Debug)]
pub struct StaticSchedule {
    feed_id: String,
    time_zone: Tz,
    agencies: HashMap<FeedScopedId, Arc<Agency>>,
    routes: HashMap<FeedScopedId, Arc<Route>>,
    stations: HashMap<FeedScopedId, Station>,
    stops: HashMap<FeedScopedId, Stop>,
    station_children: HashMap<FeedScopedId, Vec<FeedScopedId>>,
    scheduled_stop_points: HashMap<FeedScopedId, FeedScopedId>,
    trips: HashMap<FeedScopedId, Arc<Trip>>,
    patterns: HashMap<FeedScopedId, Arc<TripPattern>>,
    pattern_for_trip: HashMap<FeedScopedId, Arc<TripPattern>>,
    patterns_for_route: HashMap<FeedScopedId, Vec<Arc<TripPattern>>>,
    dated_trips: HashMap<FeedScopedId, TripOnServiceDate>,
    calendar: CalendarService,
}

impl StaticSchedule {
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn agency(&self, id: &FeedScopedId) -> Option<&Arc<Agency>> {
        self.agencies.get(id)
    }

    pub fn route(&self, id: &FeedScopedId) -> Option<&Arc<Route>> {
        self.routes.get(id)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> + '_ {
        self.routes.values()
    }

    pub fn station(&self, id: &FeedScopedId) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn stop(&self, id: &FeedScopedId) -> Option<&Stop> {
        self.stops.get(id)
    }

    /// The stop a scheduled stop point is served by.
    pub fn stop_for_scheduled_stop_point(&self, id: &FeedScopedId) -> Option<&Stop> {
        self.scheduled_stop_points
            .get(id)
            .and_then(|stop_id| self.stops.get(stop_id))
    }

    /// Other stops in the same parent station, excluding `stop` itself.
    pub fn sibling_stops<'a>(&'a self, stop: &'a Stop) -> impl Iterator<Item = &'a Stop> + 'a {
        stop.parent_station
            .as_ref()
            .and_then(|parent| self.station_children.get(parent))
            .into_iter()
            .flatten()
            .filter(move |id| **id != stop.id)
            .filter_map(|id| self.stops.get(id))
    }

    /// True if the ids are equal, or both are known stops sharing a parent.
    pub fn is_same_or_sibling(&self, a: &FeedScopedId, b: &FeedScopedId) -> bool {
        if a == b {
            return true;
        }
        match (self.stops.get(a), self.stops.get(b)) {
            (Some(a), Some(b)) => a.shares_station_with(b),
            _ => false,
        }
    }

    pub fn trip(&self, id: &FeedScopedId) -> Option<&Arc<Trip>> {
        self.trips.get(id)
    }

    pub fn trips(&self) -> impl Iterator<Item = &Arc<Trip>> + '_ {
        self.trips.values()
    }

    pub fn pattern(&self, id: &FeedScopedId) -> Option<&Arc<TripPattern>> {
        self.patterns.get(id)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Arc<TripPattern>> + '_ {
        self.patterns.values()
    }

    /// The scheduled pattern a trip runs on.
    pub fn pattern_for_trip(&self, trip_id: &FeedScopedId) -> Option<&Arc<TripPattern>> {
        self.pattern_for_trip.get(trip_id)
    }

    pub fn patterns_for_route(&self, route_id: &FeedScopedId) -> &[Arc<TripPattern>] {
        self.patterns_for_route
            .get(route_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn dated_trip(&self, id: &FeedScopedId) -> Option<&TripOnServiceDate> {
        self.dated_trips.get(id)
    }

    /// The dated-trip record for a trip on a date, if one exists.
    pub fn dated_trip_for(&self, trip_id: &FeedScopedId, date: NaiveDate) -> Option<&TripOnServiceDate> {
        self.dated_trips
            .values()
            .find(|d| d.trip.id == *trip_id && d.service_date == date)
    }

    pub fn calendar(&self) -> &CalendarService {
        &self.calendar
    }

    /// True if the trip's calendar service runs on the date.
    pub fn is_trip_active(&self, trip: &Trip, date: NaiveDate) -> bool {
        self.calendar.is_active(&trip.service_id, date)
    }

    /// Scope a local id to this feed.
    pub fn scoped_id(&self, id: &str) -> Result<FeedScopedId, ScheduleError> {
        Ok(FeedScopedId::new(self.feed_id.clone(), id)?)
    }
}

/// Incremental construction of a [`StaticSchedule`].
///
/// Entities are added in dependency order (agencies before routes, routes
/// before trips); [`ScheduleBuilder::build`] checks every cross-reference.
#[derive(Debug)]
pub struct ScheduleBuilder {
    schedule: StaticSchedule,
}

impl ScheduleBuilder {
    pub fn new(feed_id: impl Into<String>, time_zone: Tz) -> Self {
        Self {
            schedule: StaticSchedule {
                feed_id: feed_id.into(),
                time_zone,
                agencies: HashMap::new(),
                routes: HashMap::new(),
                stations: HashMap::new(),
                stops: HashMap::new(),
                station_children: HashMap::new(),
                scheduled_stop_points: HashMap::new(),
                trips: HashMap::new(),
                patterns: HashMap::new(),
                pattern_for_trip: HashMap::new(),
                patterns_for_route: HashMap::new(),
                dated_trips: HashMap::new(),
                calendar: CalendarService::new(),
            },
        }
    }

    pub fn feed_id(&self) -> &str {
        &self.schedule.feed_id
    }

    pub fn agency(&mut self, agency: Agency) -> Arc<Agency> {
        let agency = Arc::new(agency);
        self.schedule
            .agencies
            .insert(agency.id.clone(), Arc::clone(&agency));
        agency
    }

    pub fn route(&mut self, route: Route) -> Arc<Route> {
        let route = Arc::new(route);
        self.schedule
            .routes
            .insert(route.id.clone(), Arc::clone(&route));
        route
    }

    pub fn station(&mut self, station: Station) {
        self.schedule.stations.insert(station.id.clone(), station);
    }

    pub fn stop(&mut self, stop: Stop) {
        if let Some(parent) = &stop.parent_station {
            self.schedule
                .station_children
                .entry(parent.clone())
                .or_default()
                .push(stop.id.clone());
        }
        self.schedule.stops.insert(stop.id.clone(), stop);
    }

    pub fn scheduled_stop_point(&mut self, id: FeedScopedId, stop: FeedScopedId) {
        self.schedule.scheduled_stop_points.insert(id, stop);
    }

    pub fn trip(&mut self, trip: Trip) -> Arc<Trip> {
        let trip = Arc::new(trip);
        self.schedule
            .trips
            .insert(trip.id.clone(), Arc::clone(&trip));
        trip
    }

    pub fn pattern(&mut self, pattern: TripPattern) -> Arc<TripPattern> {
        let pattern = Arc::new(pattern);
        self.schedule
            .patterns
            .insert(pattern.id().clone(), Arc::clone(&pattern));
        self.schedule
            .patterns_for_route
            .entry(pattern.route().id.clone())
            .or_default()
            .push(Arc::clone(&pattern));
        pattern
    }

    pub fn dated_trip(&mut self, dated_trip: TripOnServiceDate) {
        self.schedule
            .dated_trips
            .insert(dated_trip.id.clone(), dated_trip);
    }

    pub fn service_date(&mut self, service_id: FeedScopedId, date: NaiveDate) {
        self.schedule.calendar.add(service_id, date);
    }

    /// Check references and index trips by pattern.
    pub fn build(mut self) -> Result<StaticSchedule, ScheduleError> {
        let s = &mut self.schedule;

        for stop in s.stops.values() {
            if let Some(parent) = &stop.parent_station {
                if !s.stations.contains_key(parent) {
                    return Err(unknown("station", parent));
                }
            }
        }
        for stop_id in s.scheduled_stop_points.values() {
            if !s.stops.contains_key(stop_id) {
                return Err(unknown("stop", stop_id));
            }
        }
        for route in s.routes.values() {
            if !s.agencies.contains_key(&route.agency.id) {
                return Err(unknown("agency", &route.agency.id));
            }
        }
        for trip in s.trips.values() {
            if !s.routes.contains_key(&trip.route.id) {
                return Err(unknown("route", &trip.route.id));
            }
        }

        let mut pattern_for_trip = HashMap::new();
        for pattern in s.patterns.values() {
            if !s.routes.contains_key(&pattern.route().id) {
                return Err(unknown("route", &pattern.route().id));
            }
            if let Some(stop) = pattern.stop_pattern().stops().find(|id| !s.stops.contains_key(id)) {
                return Err(unknown("stop", stop));
            }
            for times in pattern.scheduled_times() {
                if !s.trips.contains_key(times.trip_id()) {
                    return Err(unknown("trip", times.trip_id()));
                }
                if pattern_for_trip
                    .insert(times.trip_id().clone(), Arc::clone(pattern))
                    .is_some()
                {
                    return Err(ScheduleError::DuplicateTrip(times.trip_id().clone()));
                }
            }
        }
        s.pattern_for_trip = pattern_for_trip;

        for dated in s.dated_trips.values() {
            if !s.trips.contains_key(&dated.trip.id) {
                return Err(unknown("trip", &dated.trip.id));
            }
        }

        Ok(self.schedule)
    }
}

fn unknown(kind: &'static str, id: &FeedScopedId) -> ScheduleError {
    ScheduleError::UnknownReference {
        kind,
        id: id.clone(),
    }
}
