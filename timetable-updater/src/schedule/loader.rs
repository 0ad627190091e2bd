//! JSON schedule loading.
//!
//! The document mirrors the domain model with feed-local ids; every id is
//! scoped to the document's `feedId` on load. Times are `HH:MM:SS` strings,
//! with hours past 23 for trips running after midnight.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::domain::{
    Agency, Direction, FeedScopedId, PickDrop, Route, Station, Stop, StopPattern,
    StopPatternEntry, TransitMode, Trip, TripOnServiceDate, TripPattern, TripTimes,
    parse_service_time,
};

use super::error::ScheduleError;
use super::model::{ScheduleBuilder, StaticSchedule};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleDto {
    feed_id: String,
    time_zone: String,
    #[serde(default)]
    agencies: Vec<AgencyDto>,
    #[serde(default)]
    routes: Vec<RouteDto>,
    #[serde(default)]
    stations: Vec<StationDto>,
    #[serde(default)]
    stops: Vec<StopDto>,
    #[serde(default)]
    scheduled_stop_points: Vec<ScheduledStopPointDto>,
    #[serde(default)]
    calendar: Vec<CalendarDto>,
    #[serde(default)]
    trips: Vec<TripDto>,
    #[serde(default)]
    patterns: Vec<PatternDto>,
    #[serde(default)]
    dated_trips: Vec<DatedTripDto>,
}

#[derive(Debug, Clone, Deserialize)]
struct AgencyDto {
    id: String,
    name: String,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteDto {
    id: String,
    agency: String,
    #[serde(default)]
    mode: TransitMode,
    submode: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    url: Option<String>,
    operator: Option<String>,
    gtfs_type: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct StationDto {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopDto {
    id: String,
    name: String,
    parent_station: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScheduledStopPointDto {
    id: String,
    stop: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarDto {
    service_id: String,
    dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripDto {
    id: String,
    route: String,
    service_id: String,
    direction: Option<Direction>,
    headsign: Option<String>,
    short_name: Option<String>,
    mode: Option<TransitMode>,
    internal_planning_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PatternStopDto {
    stop: String,
    #[serde(default)]
    pickup: PickDrop,
    #[serde(default)]
    dropoff: PickDrop,
}

#[derive(Debug, Clone, Deserialize)]
struct PatternTripDto {
    trip: String,
    /// One `[arrival, departure]` pair per stop.
    times: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
struct PatternDto {
    id: String,
    route: String,
    direction: Option<Direction>,
    stops: Vec<PatternStopDto>,
    #[serde(default)]
    trips: Vec<PatternTripDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatedTripDto {
    id: String,
    trip: String,
    service_date: NaiveDate,
    #[serde(default)]
    replacement_for: Vec<String>,
}

/// Load a schedule from a JSON file.
pub fn load_schedule(path: &Path) -> Result<StaticSchedule, ScheduleError> {
    let json = std::fs::read_to_string(path).map_err(|e| ScheduleError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_schedule(&json)
}

/// Parse a schedule from a JSON document.
pub fn parse_schedule(json: &str) -> Result<StaticSchedule, ScheduleError> {
    let dto: ScheduleDto = serde_json::from_str(json).map_err(|e| ScheduleError::Json {
        message: e.to_string(),
    })?;
    convert_schedule(dto)
}

fn convert_schedule(dto: ScheduleDto) -> Result<StaticSchedule, ScheduleError> {
    let tz: Tz = dto
        .time_zone
        .parse()
        .map_err(|_| ScheduleError::TimeZone(dto.time_zone.clone()))?;
    let feed = dto.feed_id.as_str();
    let scoped = |id: &str| FeedScopedId::new(feed, id).map_err(ScheduleError::from);
    let mut b = ScheduleBuilder::new(feed, tz);

    let mut agencies = std::collections::HashMap::new();
    for a in dto.agencies {
        let agency = b.agency(Agency {
            id: scoped(&a.id)?,
            name: a.name,
            timezone: a.timezone.unwrap_or_else(|| dto.time_zone.clone()),
        });
        agencies.insert(agency.id.clone(), agency);
    }

    let mut routes = std::collections::HashMap::new();
    for r in dto.routes {
        let agency_id = scoped(&r.agency)?;
        let agency = agencies
            .get(&agency_id)
            .cloned()
            .ok_or(ScheduleError::UnknownReference {
                kind: "agency",
                id: agency_id,
            })?;
        let mut route = Route::new(scoped(&r.id)?, agency, r.mode);
        route.submode = r.submode;
        route.short_name = r.short_name;
        route.long_name = r.long_name;
        route.url = r.url;
        route.operator_id = r.operator.as_deref().map(scoped).transpose()?;
        route.gtfs_type = r.gtfs_type;
        let route = b.route(route);
        routes.insert(route.id.clone(), route);
    }

    for s in dto.stations {
        b.station(Station {
            id: scoped(&s.id)?,
            name: s.name,
        });
    }
    for s in dto.stops {
        let mut stop = Stop::new(scoped(&s.id)?, s.name);
        if let Some(parent) = s.parent_station {
            stop = stop.with_parent_station(scoped(&parent)?);
        }
        b.stop(stop);
    }
    for p in dto.scheduled_stop_points {
        b.scheduled_stop_point(scoped(&p.id)?, scoped(&p.stop)?);
    }
    for c in dto.calendar {
        let service_id = scoped(&c.service_id)?;
        for date in c.dates {
            b.service_date(service_id.clone(), date);
        }
    }

    let mut trips = std::collections::HashMap::new();
    for t in dto.trips {
        let route = lookup(&routes, scoped(&t.route)?, "route")?;
        let mut trip = Trip::new(scoped(&t.id)?, route, scoped(&t.service_id)?);
        trip.direction = t.direction;
        trip.headsign = t.headsign;
        trip.short_name = t.short_name;
        if let Some(mode) = t.mode {
            trip.mode = mode;
        }
        trip.internal_planning_code = t.internal_planning_code;
        let trip = b.trip(trip);
        trips.insert(trip.id.clone(), trip);
    }

    for p in dto.patterns {
        let route = lookup(&routes, scoped(&p.route)?, "route")?;
        let entries = p
            .stops
            .iter()
            .map(|s| {
                Ok(StopPatternEntry {
                    stop: scoped(&s.stop)?,
                    pickup: s.pickup,
                    dropoff: s.dropoff,
                })
            })
            .collect::<Result<Vec<_>, ScheduleError>>()?;

        let mut times = Vec::with_capacity(p.trips.len());
        for pt in p.trips {
            let trip = lookup(&trips, scoped(&pt.trip)?, "trip")?;
            let mut arrivals = Vec::with_capacity(pt.times.len());
            let mut departures = Vec::with_capacity(pt.times.len());
            for (arrival, departure) in &pt.times {
                arrivals.push(parse_service_time(arrival)?);
                departures.push(parse_service_time(departure)?);
            }
            let trip_times = TripTimes::scheduled(trip.id.clone(), arrivals, departures)
                .map_err(|source| ScheduleError::Times {
                    trip_id: trip.id.clone(),
                    source,
                })?
                .with_headsign(trip.headsign.clone());
            times.push(trip_times);
        }

        let pattern = TripPattern::scheduled(
            scoped(&p.id)?,
            route,
            p.direction,
            StopPattern::new(entries),
            times,
        )?;
        b.pattern(pattern);
    }

    for d in dto.dated_trips {
        let trip = lookup(&trips, scoped(&d.trip)?, "trip")?;
        b.dated_trip(TripOnServiceDate {
            id: scoped(&d.id)?,
            trip,
            service_date: d.service_date,
            replacement_for: d
                .replacement_for
                .iter()
                .map(|id| scoped(id))
                .collect::<Result<_, _>>()?,
        });
    }

    b.build()
}

fn lookup<T>(
    map: &std::collections::HashMap<FeedScopedId, Arc<T>>,
    id: FeedScopedId,
    kind: &'static str,
) -> Result<Arc<T>, ScheduleError> {
    map.get(&id)
        .cloned()
        .ok_or(ScheduleError::UnknownReference { kind, id })
}
