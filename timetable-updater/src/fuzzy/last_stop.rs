use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::{FeedScopedId, SECONDS_PER_DAY, TransitMode, Trip};
use crate::error::{UpdateError, UpdateErrorKind};
use crate::resolve::ResolvedStopTimeUpdate;
use crate::schedule::StaticSchedule;
use crate::update::ParsedTripUpdate;

use super::{FuzzyTripMatcher, TripAndPattern};

/// Trips keyed by last stop and scheduled arrival there, and rail trips
/// keyed by internal planning code.
#[derive(Debug, Default)]
struct LastStopIndex {
    by_last_arrival: HashMap<(FeedScopedId, i32), Vec<Arc<Trip>>>,
    by_planning_code: HashMap<String, Vec<Arc<Trip>>>,
}

impl LastStopIndex {
    fn build(schedule: &StaticSchedule) -> Self {
        let mut index = LastStopIndex::default();
        for trip in schedule.trips() {
            let Some(pattern) = schedule.pattern_for_trip(&trip.id) else {
                continue;
            };
            if let (Some(last_stop), Some(times)) = (
                pattern.stop_pattern().last_stop(),
                pattern.scheduled_trip_times(&trip.id),
            ) {
                index
                    .by_last_arrival
                    .entry((last_stop.clone(), times.scheduled_last_arrival()))
                    .or_default()
                    .push(Arc::clone(trip));
            }
            if pattern.route().mode != TransitMode::Rail {
                continue;
            }
            if let Some(code) = &trip.internal_planning_code {
                index
                    .by_planning_code
                    .entry(code.clone())
                    .or_default()
                    .push(Arc::clone(trip));
            }
        }
        info!(
            last_stop_keys = index.by_last_arrival.len(),
            planning_codes = index.by_planning_code.len(),
            "Built last-stop arrival index"
        );
        index
    }
}

/// Matches a journey by its last stop and scheduled arrival time.
///
/// The index is built exactly once, on first use or eagerly through
/// [`LastStopArrivalMatcher::warm_up`], and is read-only afterwards.
///
/// Candidates must run on the service date, start and end at the journey's
/// first and last stops (or a sibling in the same station), and depart the
/// first stop at the journey's aimed departure.
pub struct LastStopArrivalMatcher {
    schedule: Arc<StaticSchedule>,
    index: OnceLock<LastStopIndex>,
}

impl LastStopArrivalMatcher {
    pub fn new(schedule: Arc<StaticSchedule>) -> Self {
        Self {
            schedule,
            index: OnceLock::new(),
        }
    }

    /// Build the index now rather than on the first match.
    pub fn warm_up(self) -> Self {
        self.index();
        self
    }

    fn index(&self) -> &LastStopIndex {
        self.index.get_or_init(|| LastStopIndex::build(&self.schedule))
    }

    fn candidates_by_arrival(&self, last_stop: &FeedScopedId, arrival: i32) -> Vec<Arc<Trip>> {
        let index = self.index();
        let mut keys = vec![
            (last_stop.clone(), arrival),
            // Trips of the previous service day arrive after 24:00
            (last_stop.clone(), arrival + SECONDS_PER_DAY),
        ];
        if let Some(stop) = self.schedule.stop(last_stop) {
            keys.extend(
                self.schedule
                    .sibling_stops(stop)
                    .map(|sibling| (sibling.id.clone(), arrival)),
            );
        }
        keys.iter()
            .filter_map(|key| index.by_last_arrival.get(key))
            .flatten()
            .cloned()
            .collect()
    }

    fn find_exact_match(
        &self,
        candidates: Vec<Arc<Trip>>,
        journey: &Journey,
        service_date: NaiveDate,
    ) -> Result<TripAndPattern, UpdateErrorKind> {
        let mut matches = BTreeMap::new();
        for trip in candidates {
            if !self.schedule.is_trip_active(&trip, service_date) {
                continue;
            }
            let Some(pattern) = self.schedule.pattern_for_trip(&trip.id) else {
                continue;
            };
            let stops = pattern.stop_pattern();
            let ends_match = stops
                .first_stop()
                .is_some_and(|s| self.schedule.is_same_or_sibling(s, &journey.first_stop))
                && stops
                    .last_stop()
                    .is_some_and(|s| self.schedule.is_same_or_sibling(s, &journey.last_stop));
            if !ends_match {
                continue;
            }
            let departs_on_time = pattern
                .scheduled_trip_times(&trip.id)
                .is_some_and(|t| t.scheduled_first_departure() == journey.aimed_departure);
            if departs_on_time {
                matches.insert(trip.id.clone(), (trip, Arc::clone(pattern)));
            }
        }

        if matches.len() > 1 {
            warn!(
                count = matches.len(),
                trips = ?matches.keys().collect::<Vec<_>>(),
                "Multiple fuzzy matches, skipping all"
            );
            return Err(UpdateErrorKind::MultipleFuzzyTripMatches);
        }
        matches
            .into_values()
            .next()
            .map(|(trip, pattern)| TripAndPattern {
                trip,
                pattern,
                service_date,
            })
            .ok_or(UpdateErrorKind::NoFuzzyTripMatch)
    }

    fn filter_by_route(candidates: Vec<Arc<Trip>>, route_id: Option<&FeedScopedId>) -> Vec<Arc<Trip>> {
        match route_id {
            Some(route_id) => candidates
                .into_iter()
                .filter(|t| t.route.id == *route_id)
                .collect(),
            None => candidates,
        }
    }
}

/// What the update says about the journey's ends.
struct Journey {
    first_stop: FeedScopedId,
    last_stop: FeedScopedId,
    aimed_departure: i32,
    aimed_last_arrival: i32,
}

impl Journey {
    fn from_update(
        update: &ParsedTripUpdate,
        schedule: &StaticSchedule,
        service_date: NaiveDate,
    ) -> Result<Self, UpdateErrorKind> {
        let (Some(first), Some(last)) = (
            update.stop_time_updates().first(),
            update.stop_time_updates().last(),
        ) else {
            return Err(UpdateErrorKind::NoValidStops);
        };
        let tz = schedule.time_zone();
        let first = ResolvedStopTimeUpdate::resolve(first, schedule, service_date, tz);
        let last = ResolvedStopTimeUpdate::resolve(last, schedule, service_date, tz);

        let aimed_departure = first
            .aimed_departure()
            .ok_or(UpdateErrorKind::NoFuzzyTripMatch)?;
        let aimed_last_arrival = last
            .aimed_arrival()
            .or_else(|| last.aimed_departure())
            .ok_or(UpdateErrorKind::NoFuzzyTripMatch)?;

        let (Some(first_stop), Some(last_stop)) = (first.stop, last.stop) else {
            return Err(UpdateErrorKind::NoValidStops);
        };

        Ok(Journey {
            first_stop: first_stop.id,
            last_stop: last_stop.id,
            aimed_departure,
            aimed_last_arrival,
        })
    }
}

impl FuzzyTripMatcher for LastStopArrivalMatcher {
    fn match_trip(
        &self,
        update: &ParsedTripUpdate,
        service_date: NaiveDate,
    ) -> Result<TripAndPattern, UpdateError> {
        let reference = update.reference();
        let fail = |kind| UpdateError::new(reference.trip_id.clone(), kind);

        let journey = Journey::from_update(update, &self.schedule, service_date).map_err(fail)?;
        let route_id = reference.route_id.as_ref();

        let by_code = reference
            .planning_code()
            .and_then(|code| self.index().by_planning_code.get(code));
        if let Some(by_code) = by_code {
            let candidates = Self::filter_by_route(by_code.clone(), route_id);
            if let Ok(found) = self.find_exact_match(candidates, &journey, service_date) {
                debug!(trip = %found.trip.id, "Fuzzy matched by planning code");
                return Ok(found);
            }
        }

        let candidates = Self::filter_by_route(
            self.candidates_by_arrival(&journey.last_stop, journey.aimed_last_arrival),
            route_id,
        );
        if candidates.is_empty() {
            debug!(
                last_stop = %journey.last_stop,
                arrival = journey.aimed_last_arrival,
                "No fuzzy candidates"
            );
            return Err(fail(UpdateErrorKind::NoFuzzyTripMatch));
        }
        let found = self
            .find_exact_match(candidates, &journey, service_date)
            .map_err(fail)?;
        debug!(trip = %found.trip.id, "Fuzzy matched by last stop arrival");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Network, date, hms, id};
    use crate::update::{
        ParsedStopTimeUpdate, StopReference, TimeUpdate, TripReference, UpdateType,
    };

    fn call(stop: &str, aimed: i32) -> ParsedStopTimeUpdate {
        ParsedStopTimeUpdate {
            arrival: Some(TimeUpdate::of_absolute(aimed + 60, Some(aimed)).into()),
            departure: Some(TimeUpdate::of_absolute(aimed + 60, Some(aimed)).into()),
            ..ParsedStopTimeUpdate::for_stop(StopReference::of_stop(id(stop)))
        }
    }

    fn journey(reference: TripReference, calls: Vec<ParsedStopTimeUpdate>) -> ParsedTripUpdate {
        ParsedTripUpdate::builder(UpdateType::UpdateExisting, reference)
            .service_date(date())
            .stop_time_updates(calls)
            .build()
    }

    fn matcher() -> LastStopArrivalMatcher {
        LastStopArrivalMatcher::new(Network::abc().schedule).warm_up()
    }

    #[test]
    fn single_candidate_matches() {
        let update = journey(
            TripReference::default(),
            vec![call("A", hms(10, 0, 0)), call("B", hms(10, 30, 0)), call("C", hms(11, 0, 0))],
        );
        let found = matcher().match_trip(&update, date()).unwrap();
        assert_eq!(found.trip.id, id("T1"));
        assert_eq!(found.pattern.id(), &id("P1"));
        assert_eq!(found.service_date, date());
    }

    #[test]
    fn identical_trips_are_ambiguous() {
        // T4 and T5 both run A 08:00 to C 09:00
        let update = journey(
            TripReference::default(),
            vec![call("A", hms(8, 0, 0)), call("C", hms(9, 0, 0))],
        );
        let err = matcher().match_trip(&update, date()).unwrap_err();
        assert_eq!(err.kind(), UpdateErrorKind::MultipleFuzzyTripMatches);
    }

    #[test]
    fn planning_code_disambiguates_rail() {
        let reference = TripReference {
            internal_planning_code: Some("5678".to_string()),
            ..TripReference::default()
        };
        let update = journey(reference, vec![call("A", hms(8, 0, 0)), call("C", hms(9, 0, 0))]);
        let found = matcher().match_trip(&update, date()).unwrap();
        assert_eq!(found.trip.id, id("T5"));
    }

    #[test]
    fn sibling_last_stop_matches() {
        // T3 ends at B; the journey reports B2 in the same station
        let update = journey(
            TripReference::default(),
            vec![call("A", hms(14, 0, 0)), call("B2", hms(14, 30, 0))],
        );
        let found = matcher().match_trip(&update, date()).unwrap();
        assert_eq!(found.trip.id, id("T3"));
    }

    #[test]
    fn wrong_departure_or_date_does_not_match() {
        let m = matcher();
        let late = journey(
            TripReference::default(),
            vec![call("A", hms(10, 1, 0)), call("C", hms(11, 0, 0))],
        );
        assert_eq!(
            m.match_trip(&late, date()).unwrap_err().kind(),
            UpdateErrorKind::NoFuzzyTripMatch
        );

        let sunday = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        let t1 = journey(
            TripReference::default(),
            vec![call("A", hms(10, 0, 0)), call("C", hms(11, 0, 0))],
        );
        assert_eq!(
            m.match_trip(&t1, sunday).unwrap_err().kind(),
            UpdateErrorKind::NoFuzzyTripMatch
        );
    }

    #[test]
    fn route_filter_applies() {
        let reference = TripReference {
            route_id: Some(id("R2")),
            ..TripReference::default()
        };
        let update = journey(
            reference,
            vec![call("A", hms(10, 0, 0)), call("C", hms(11, 0, 0))],
        );
        assert_eq!(
            matcher().match_trip(&update, date()).unwrap_err().kind(),
            UpdateErrorKind::NoFuzzyTripMatch
        );
    }

    #[test]
    fn no_stops_or_unknown_stops() {
        let m = matcher();
        let empty = journey(TripReference::default(), Vec::new());
        assert_eq!(
            m.match_trip(&empty, date()).unwrap_err().kind(),
            UpdateErrorKind::NoValidStops
        );
        let unknown = journey(
            TripReference::default(),
            vec![call("nope", hms(10, 0, 0)), call("C", hms(11, 0, 0))],
        );
        assert_eq!(
            m.match_trip(&unknown, date()).unwrap_err().kind(),
            UpdateErrorKind::NoValidStops
        );
    }
}
