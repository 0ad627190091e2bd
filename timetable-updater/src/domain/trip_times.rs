//! Per-trip arrival and departure times.
//!
//! [`TripTimes`] is immutable: real-time edits go through a
//! [`RealTimeTripTimesBuilder`], and `build` refuses any result whose times
//! run backwards. Scheduled times are shared between copies, so cloning a
//! timetable only copies the real-time columns.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::FeedScopedId;

/// Real-time state of a whole trip on one service date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealTimeState {
    /// No real-time information.
    #[default]
    Scheduled,
    /// Times updated, stop pattern unchanged.
    Updated,
    /// Stop pattern changed in real time.
    Modified,
    /// Trip did not exist in the schedule.
    Added,
    Canceled,
    /// Removed from this pattern, typically because it moved to another.
    Deleted,
}

impl fmt::Display for RealTimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RealTimeState::Scheduled => "SCHEDULED",
            RealTimeState::Updated => "UPDATED",
            RealTimeState::Modified => "MODIFIED",
            RealTimeState::Added => "ADDED",
            RealTimeState::Canceled => "CANCELED",
            RealTimeState::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// Passenger load reported for a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStatus {
    Empty,
    ManySeatsAvailable,
    FewSeatsAvailable,
    StandingRoomOnly,
    CrushedStandingRoomOnly,
    Full,
    NotAcceptingPassengers,
}

/// Real-time flags for one stop of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopFlags {
    /// The vehicle will not serve this stop.
    pub cancelled: bool,
    /// No real-time information; times are scheduled.
    pub no_data: bool,
    /// Times are observed, not predicted.
    pub recorded: bool,
    /// The producer flagged the prediction as unreliable.
    pub inaccurate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct StopRealTime {
    flags: StopFlags,
    headsign: Option<String>,
    occupancy: Option<OccupancyStatus>,
}

/// Errors from building or validating trip times.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimesError {
    /// Arrival and departure columns differ in length
    #[error("stop count mismatch: {arrivals} arrivals, {departures} departures")]
    LengthMismatch { arrivals: usize, departures: usize },

    /// A trip with no stops
    #[error("trip times must have at least one stop")]
    Empty,

    /// A stop was left without a time
    #[error("missing time at stop {stop_index}")]
    MissingTime { stop_index: usize },

    /// Departure before arrival at the same stop
    #[error("negative dwell time at stop {stop_index}")]
    NegativeDwellTime { stop_index: usize },

    /// Arrival before the departure from the previous stop
    #[error("negative hop time arriving at stop {stop_index}")]
    NegativeHopTime { stop_index: usize },
}

impl TimesError {
    /// The stop the error refers to, if any.
    pub fn stop_index(&self) -> Option<usize> {
        match self {
            TimesError::MissingTime { stop_index }
            | TimesError::NegativeDwellTime { stop_index }
            | TimesError::NegativeHopTime { stop_index } => Some(*stop_index),
            TimesError::LengthMismatch { .. } | TimesError::Empty => None,
        }
    }
}

fn validate(arrivals: &[i32], departures: &[i32]) -> Result<(), TimesError> {
    for i in 0..arrivals.len() {
        if departures[i] < arrivals[i] {
            return Err(TimesError::NegativeDwellTime { stop_index: i });
        }
        if i > 0 && arrivals[i] < departures[i - 1] {
            return Err(TimesError::NegativeHopTime { stop_index: i });
        }
    }
    Ok(())
}

/// Arrival and departure times of one trip, in seconds since start of
/// service, with real-time state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripTimes {
    trip_id: FeedScopedId,
    scheduled_arrivals: Arc<[i32]>,
    scheduled_departures: Arc<[i32]>,
    arrivals: Vec<i32>,
    departures: Vec<i32>,
    stops: Vec<StopRealTime>,
    headsign: Option<String>,
    state: RealTimeState,
}

impl TripTimes {
    /// Create scheduled trip times, with real-time equal to scheduled.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::domain::{FeedScopedId, TripTimes};
    ///
    /// let trip = FeedScopedId::new("F", "T1").unwrap();
    /// let times = TripTimes::scheduled(trip.clone(), vec![0, 600], vec![60, 600]).unwrap();
    /// assert_eq!(times.num_stops(), 2);
    /// assert_eq!(times.arrival_delay(1), 0);
    ///
    /// // Departing before arriving is rejected
    /// assert!(TripTimes::scheduled(trip, vec![60], vec![0]).is_err());
    /// ```
    pub fn scheduled(
        trip_id: FeedScopedId,
        arrivals: Vec<i32>,
        departures: Vec<i32>,
    ) -> Result<Self, TimesError> {
        if arrivals.len() != departures.len() {
            return Err(TimesError::LengthMismatch {
                arrivals: arrivals.len(),
                departures: departures.len(),
            });
        }
        if arrivals.is_empty() {
            return Err(TimesError::Empty);
        }
        validate(&arrivals, &departures)?;

        let n = arrivals.len();
        Ok(Self {
            trip_id,
            scheduled_arrivals: arrivals.clone().into(),
            scheduled_departures: departures.clone().into(),
            arrivals,
            departures,
            stops: vec![StopRealTime::default(); n],
            headsign: None,
            state: RealTimeState::Scheduled,
        })
    }

    /// Set the trip headsign.
    pub fn with_headsign(mut self, headsign: Option<String>) -> Self {
        self.headsign = headsign;
        self
    }

    pub fn trip_id(&self) -> &FeedScopedId {
        &self.trip_id
    }

    pub fn num_stops(&self) -> usize {
        self.arrivals.len()
    }

    pub fn state(&self) -> RealTimeState {
        self.state
    }

    pub fn headsign(&self) -> Option<&str> {
        self.headsign.as_deref()
    }

    pub fn arrival(&self, stop: usize) -> i32 {
        self.arrivals[stop]
    }

    pub fn departure(&self, stop: usize) -> i32 {
        self.departures[stop]
    }

    pub fn scheduled_arrival(&self, stop: usize) -> i32 {
        self.scheduled_arrivals[stop]
    }

    pub fn scheduled_departure(&self, stop: usize) -> i32 {
        self.scheduled_departures[stop]
    }

    pub fn arrival_delay(&self, stop: usize) -> i32 {
        self.arrivals[stop] - self.scheduled_arrivals[stop]
    }

    pub fn departure_delay(&self, stop: usize) -> i32 {
        self.departures[stop] - self.scheduled_departures[stop]
    }

    pub fn stop_flags(&self, stop: usize) -> StopFlags {
        self.stops[stop].flags
    }

    pub fn is_cancelled_stop(&self, stop: usize) -> bool {
        self.stops[stop].flags.cancelled
    }

    pub fn stop_headsign(&self, stop: usize) -> Option<&str> {
        self.stops[stop].headsign.as_deref()
    }

    pub fn occupancy(&self, stop: usize) -> Option<OccupancyStatus> {
        self.stops[stop].occupancy
    }

    /// Scheduled departure from the first stop.
    pub fn scheduled_first_departure(&self) -> i32 {
        self.scheduled_departures[0]
    }

    /// Scheduled arrival at the last stop.
    pub fn scheduled_last_arrival(&self) -> i32 {
        self.scheduled_arrivals[self.scheduled_arrivals.len() - 1]
    }

    /// A copy of these times, whole trip marked cancelled.
    pub fn cancelled(&self) -> TripTimes {
        TripTimes {
            state: RealTimeState::Canceled,
            ..self.clone()
        }
    }

    /// A copy of these times, whole trip marked deleted.
    pub fn deleted(&self) -> TripTimes {
        TripTimes {
            state: RealTimeState::Deleted,
            ..self.clone()
        }
    }

    /// The scheduled baseline of these times, with all real-time data dropped.
    pub fn scheduled_copy(&self) -> TripTimes {
        TripTimes {
            trip_id: self.trip_id.clone(),
            scheduled_arrivals: Arc::clone(&self.scheduled_arrivals),
            scheduled_departures: Arc::clone(&self.scheduled_departures),
            arrivals: self.scheduled_arrivals.to_vec(),
            departures: self.scheduled_departures.to_vec(),
            stops: vec![StopRealTime::default(); self.num_stops()],
            headsign: self.headsign.clone(),
            state: RealTimeState::Scheduled,
        }
    }

    /// Start a real-time edit with every time pre-filled from the schedule.
    pub fn real_time_builder(&self) -> RealTimeTripTimesBuilder {
        let mut builder = self.builder_without_times();
        builder.arrivals = self.scheduled_arrivals.iter().copied().map(Some).collect();
        builder.departures = self.scheduled_departures.iter().copied().map(Some).collect();
        builder
    }

    /// Start a real-time edit with no times set.
    ///
    /// Used when delays are propagated, so that stops without an explicit
    /// update can be told apart from stops running to schedule.
    pub fn builder_without_times(&self) -> RealTimeTripTimesBuilder {
        let n = self.num_stops();
        RealTimeTripTimesBuilder {
            trip_id: self.trip_id.clone(),
            scheduled_arrivals: Arc::clone(&self.scheduled_arrivals),
            scheduled_departures: Arc::clone(&self.scheduled_departures),
            arrivals: vec![None; n],
            departures: vec![None; n],
            stops: vec![StopRealTime::default(); n],
            headsign: self.headsign.clone(),
            state: RealTimeState::Scheduled,
        }
    }
}

/// Mutable working copy of [`TripTimes`] during a real-time edit.
#[derive(Debug, Clone)]
pub struct RealTimeTripTimesBuilder {
    trip_id: FeedScopedId,
    scheduled_arrivals: Arc<[i32]>,
    scheduled_departures: Arc<[i32]>,
    arrivals: Vec<Option<i32>>,
    departures: Vec<Option<i32>>,
    stops: Vec<StopRealTime>,
    headsign: Option<String>,
    state: RealTimeState,
}

impl RealTimeTripTimesBuilder {
    /// Start times for a trip whose schedule is being created now.
    pub fn for_new_schedule(
        trip_id: FeedScopedId,
        scheduled_arrivals: Vec<i32>,
        scheduled_departures: Vec<i32>,
    ) -> Result<Self, TimesError> {
        if scheduled_arrivals.len() != scheduled_departures.len() {
            return Err(TimesError::LengthMismatch {
                arrivals: scheduled_arrivals.len(),
                departures: scheduled_departures.len(),
            });
        }
        if scheduled_arrivals.is_empty() {
            return Err(TimesError::Empty);
        }
        let n = scheduled_arrivals.len();
        Ok(Self {
            trip_id,
            scheduled_arrivals: scheduled_arrivals.into(),
            scheduled_departures: scheduled_departures.into(),
            arrivals: vec![None; n],
            departures: vec![None; n],
            stops: vec![StopRealTime::default(); n],
            headsign: None,
            state: RealTimeState::Scheduled,
        })
    }

    pub fn num_stops(&self) -> usize {
        self.arrivals.len()
    }

    pub fn scheduled_arrival(&self, stop: usize) -> i32 {
        self.scheduled_arrivals[stop]
    }

    pub fn scheduled_departure(&self, stop: usize) -> i32 {
        self.scheduled_departures[stop]
    }

    pub fn arrival(&self, stop: usize) -> Option<i32> {
        self.arrivals[stop]
    }

    pub fn departure(&self, stop: usize) -> Option<i32> {
        self.departures[stop]
    }

    pub fn set_arrival(&mut self, stop: usize, time: i32) {
        self.arrivals[stop] = Some(time);
    }

    pub fn set_departure(&mut self, stop: usize, time: i32) {
        self.departures[stop] = Some(time);
    }

    pub fn set_arrival_delay(&mut self, stop: usize, delay: i32) {
        self.arrivals[stop] = Some(self.scheduled_arrivals[stop] + delay);
    }

    pub fn set_departure_delay(&mut self, stop: usize, delay: i32) {
        self.departures[stop] = Some(self.scheduled_departures[stop] + delay);
    }

    pub fn is_cancelled(&self, stop: usize) -> bool {
        self.stops[stop].flags.cancelled
    }

    pub fn is_no_data(&self, stop: usize) -> bool {
        self.stops[stop].flags.no_data
    }

    pub fn set_cancelled(&mut self, stop: usize) {
        self.stops[stop].flags.cancelled = true;
    }

    pub fn set_no_data(&mut self, stop: usize) {
        self.stops[stop].flags.no_data = true;
    }

    pub fn set_recorded(&mut self, stop: usize) {
        self.stops[stop].flags.recorded = true;
    }

    pub fn set_inaccurate(&mut self, stop: usize) {
        self.stops[stop].flags.inaccurate = true;
    }

    pub fn set_stop_headsign(&mut self, stop: usize, headsign: String) {
        self.stops[stop].headsign = Some(headsign);
    }

    pub fn set_occupancy(&mut self, stop: usize, occupancy: OccupancyStatus) {
        self.stops[stop].occupancy = Some(occupancy);
    }

    pub fn set_headsign(&mut self, headsign: Option<String>) {
        self.headsign = headsign;
    }

    pub fn set_state(&mut self, state: RealTimeState) {
        self.state = state;
    }

    pub fn state(&self) -> RealTimeState {
        self.state
    }

    /// Fill every unset time from the schedule. Returns true if any was set.
    pub fn copy_missing_times_from_schedule(&mut self) -> bool {
        let mut copied = false;
        for i in 0..self.num_stops() {
            if self.arrivals[i].is_none() {
                self.arrivals[i] = Some(self.scheduled_arrivals[i]);
                copied = true;
            }
            if self.departures[i].is_none() {
                self.departures[i] = Some(self.scheduled_departures[i]);
                copied = true;
            }
        }
        copied
    }

    /// Finish the edit, checking that every stop has a time and that times
    /// never decrease along the trip.
    pub fn build(self) -> Result<TripTimes, TimesError> {
        let mut arrivals = Vec::with_capacity(self.arrivals.len());
        let mut departures = Vec::with_capacity(self.departures.len());
        for (i, (arrival, departure)) in self.arrivals.iter().zip(&self.departures).enumerate() {
            match (arrival, departure) {
                (Some(a), Some(d)) => {
                    arrivals.push(*a);
                    departures.push(*d);
                }
                _ => return Err(TimesError::MissingTime { stop_index: i }),
            }
        }
        validate(&arrivals, &departures)?;

        Ok(TripTimes {
            trip_id: self.trip_id,
            scheduled_arrivals: self.scheduled_arrivals,
            scheduled_departures: self.scheduled_departures,
            arrivals,
            departures,
            stops: self.stops,
            headsign: self.headsign,
            state: self.state,
        })
    }
}
