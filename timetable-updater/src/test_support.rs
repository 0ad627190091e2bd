//! A small fixture network shared by unit and scenario tests.
//!
//! Stops A, B, B2, C, D, E, X. B and B2 share station SB. Times are in the
//! Europe/Oslo zone, and the fixture date is Monday 2024-06-03.
//!
//! | pattern | route | stops  | trips                                   |
//! |---------|-------|--------|-----------------------------------------|
//! | P1      | R1    | A B C  | T1 10:00–11:00, T2 12:00–13:00 (Sundays)|
//! | P2      | R1    | A B    | T3 14:00–14:30                          |
//! | P3      | R2    | A C    | T4, T5 08:00–09:00 (rail)               |
//! | P4      | R1    | D E    | T6 25:00–25:30 (after midnight)         |

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;

use crate::domain::{
    Agency, Direction, FeedScopedId, Route, Station, Stop, StopPattern, TransitMode, Trip,
    TripOnServiceDate, TripPattern, TripTimes,
};
use crate::schedule::{ScheduleBuilder, StaticSchedule};
use crate::update::{
    ParsedStopTimeUpdate, ParsedTripUpdate, StopReference, StopSequence, TimeUpdate,
    TripReference, UpdateType,
};

pub const FEED: &str = "F";
pub const TZ: Tz = chrono_tz::Europe::Oslo;

pub fn id(s: &str) -> FeedScopedId {
    FeedScopedId::new(FEED, s).unwrap()
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub fn hms(h: i32, m: i32, s: i32) -> i32 {
    h * 3600 + m * 60 + s
}

pub fn instant(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

pub struct Network {
    pub schedule: Arc<StaticSchedule>,
}

impl Network {
    pub fn abc() -> Self {
        let mut b = ScheduleBuilder::new(FEED, TZ);

        let agency = b.agency(Agency {
            id: id("AG1"),
            name: "Fixture Transit".to_string(),
            timezone: "Europe/Oslo".to_string(),
        });

        b.station(Station {
            id: id("SB"),
            name: "B Station".to_string(),
        });
        for (stop, name) in [("A", "Alpha"), ("C", "Charlie"), ("D", "Delta"), ("E", "Echo"), ("X", "Xray")] {
            b.stop(Stop::new(id(stop), name));
        }
        b.stop(Stop::new(id("B"), "Bravo").with_parent_station(id("SB")));
        b.stop(Stop::new(id("B2"), "Bravo 2").with_parent_station(id("SB")));
        b.scheduled_stop_point(id("SSP-B"), id("B"));

        let mut r1 = Route::new(id("R1"), Arc::clone(&agency), TransitMode::Bus);
        r1.operator_id = Some(id("OP1"));
        let r1 = b.route(r1);
        let r2 = b.route(Route::new(id("R2"), Arc::clone(&agency), TransitMode::Rail));

        let weekday = id("WK");
        let sunday = id("SUN");
        b.service_date(weekday.clone(), date());
        b.service_date(weekday.clone(), date().succ_opt().unwrap());
        b.service_date(sunday.clone(), NaiveDate::from_ymd_opt(2024, 6, 9).unwrap());

        let trip = |trip_id: &str, route: &Arc<Route>, service: &FeedScopedId| {
            let mut t = Trip::new(id(trip_id), Arc::clone(route), service.clone());
            t.direction = Some(Direction::Outbound);
            t
        };
        let t1 = b.trip(trip("T1", &r1, &weekday));
        b.trip(trip("T2", &r1, &sunday));
        b.trip(trip("T3", &r1, &weekday));
        let mut t4 = trip("T4", &r2, &weekday);
        t4.internal_planning_code = Some("1234".to_string());
        b.trip(t4);
        let mut t5 = trip("T5", &r2, &weekday);
        t5.internal_planning_code = Some("5678".to_string());
        b.trip(t5);
        b.trip(trip("T6", &r1, &weekday));

        let times = |trip_id: &str, stops: &[(i32, i32)]| {
            TripTimes::scheduled(
                id(trip_id),
                stops.iter().map(|(a, _)| *a).collect(),
                stops.iter().map(|(_, d)| *d).collect(),
            )
            .unwrap()
        };

        b.pattern(
            TripPattern::scheduled(
                id("P1"),
                Arc::clone(&r1),
                Some(Direction::Outbound),
                StopPattern::from_stops([id("A"), id("B"), id("C")]),
                vec![
                    times("T1", &[(hms(10, 0, 0), hms(10, 0, 0)), (hms(10, 30, 0), hms(10, 30, 0)), (hms(11, 0, 0), hms(11, 0, 0))]),
                    times("T2", &[(hms(12, 0, 0), hms(12, 0, 0)), (hms(12, 30, 0), hms(12, 30, 0)), (hms(13, 0, 0), hms(13, 0, 0))]),
                ],
            )
            .unwrap(),
        );
        b.pattern(
            TripPattern::scheduled(
                id("P2"),
                Arc::clone(&r1),
                Some(Direction::Outbound),
                StopPattern::from_stops([id("A"), id("B")]),
                vec![times("T3", &[(hms(14, 0, 0), hms(14, 0, 0)), (hms(14, 30, 0), hms(14, 30, 0))])],
            )
            .unwrap(),
        );
        b.pattern(
            TripPattern::scheduled(
                id("P3"),
                Arc::clone(&r2),
                Some(Direction::Outbound),
                StopPattern::from_stops([id("A"), id("C")]),
                vec![
                    times("T4", &[(hms(8, 0, 0), hms(8, 0, 0)), (hms(9, 0, 0), hms(9, 0, 0))]),
                    times("T5", &[(hms(8, 0, 0), hms(8, 0, 0)), (hms(9, 0, 0), hms(9, 0, 0))]),
                ],
            )
            .unwrap(),
        );
        b.pattern(
            TripPattern::scheduled(
                id("P4"),
                Arc::clone(&r1),
                Some(Direction::Outbound),
                StopPattern::from_stops([id("D"), id("E")]),
                vec![times("T6", &[(hms(25, 0, 0), hms(25, 0, 0)), (hms(25, 30, 0), hms(25, 30, 0))])],
            )
            .unwrap(),
        );

        b.dated_trip(TripOnServiceDate {
            id: id("DT1"),
            trip: t1,
            service_date: date(),
            replacement_for: Vec::new(),
        });

        Self {
            schedule: Arc::new(b.build().unwrap()),
        }
    }
}

/// A stop update at `stop` with nothing else set.
pub fn at(stop: &str) -> ParsedStopTimeUpdate {
    ParsedStopTimeUpdate::for_stop(StopReference::of_stop(id(stop)))
}

/// A stop update at `stop` with an arrival delay.
pub fn arrival_delay(stop: &str, delay: i32) -> ParsedStopTimeUpdate {
    ParsedStopTimeUpdate {
        arrival: Some(TimeUpdate::of_delay(delay).into()),
        ..at(stop)
    }
}

/// A stop update at `stop` with the same delay on arrival and departure.
pub fn delay(stop: &str, delay: i32) -> ParsedStopTimeUpdate {
    ParsedStopTimeUpdate {
        arrival: Some(TimeUpdate::of_delay(delay).into()),
        departure: Some(TimeUpdate::of_delay(delay).into()),
        ..at(stop)
    }
}

/// A stop update at `stop` with absolute times.
pub fn times_at(stop: &str, arrival: i32, departure: i32) -> ParsedStopTimeUpdate {
    ParsedStopTimeUpdate {
        arrival: Some(TimeUpdate::of_absolute(arrival, None).into()),
        departure: Some(TimeUpdate::of_absolute(departure, None).into()),
        ..at(stop)
    }
}

/// A stop update positioned explicitly.
pub fn positioned(update: ParsedStopTimeUpdate, position: usize) -> ParsedStopTimeUpdate {
    ParsedStopTimeUpdate {
        sequence: Some(StopSequence::Position(position)),
        ..update
    }
}

/// An update of `kind` for `trip` on the fixture date.
pub fn update(kind: UpdateType, trip: &str, stops: Vec<ParsedStopTimeUpdate>) -> ParsedTripUpdate {
    ParsedTripUpdate::builder(kind, TripReference::by_trip_id(id(trip)))
        .service_date(date())
        .stop_time_updates(stops)
        .data_source("test")
        .build()
}

/// A stop update with planned times and running `late` seconds behind.
pub fn aimed_call(stop: &str, aimed: i32, late: i32) -> ParsedStopTimeUpdate {
    ParsedStopTimeUpdate {
        arrival: Some(TimeUpdate::of_absolute(aimed + late, Some(aimed)).into()),
        departure: Some(TimeUpdate::of_absolute(aimed + late, Some(aimed)).into()),
        ..at(stop)
    }
}
