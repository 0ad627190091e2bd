//! Stop patterns and trip patterns.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Direction, FeedScopedId, Route, TransitMode, TripTimes};

/// Whether passengers may board or alight at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickDrop {
    #[default]
    Scheduled,
    None,
    CallAgency,
    CoordinateWithDriver,
    /// Normally allowed, but cancelled in real time.
    Cancelled,
}

impl PickDrop {
    /// True if a passenger can actually board or alight.
    pub fn is_routable(self) -> bool {
        !matches!(self, PickDrop::None | PickDrop::Cancelled)
    }
}

/// One stop of a stop pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopPatternEntry {
    pub stop: FeedScopedId,
    pub pickup: PickDrop,
    pub dropoff: PickDrop,
}

impl StopPatternEntry {
    /// A stop with boarding and alighting both allowed.
    pub fn new(stop: FeedScopedId) -> Self {
        Self {
            stop,
            pickup: PickDrop::Scheduled,
            dropoff: PickDrop::Scheduled,
        }
    }
}

/// The ordered stops of a pattern with their pickup and dropoff rules.
///
/// Two patterns with equal stop patterns are interchangeable, so this is
/// the key for deduplicating patterns created in real time.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StopPattern {
    entries: Vec<StopPatternEntry>,
}

impl StopPattern {
    pub fn new(entries: Vec<StopPatternEntry>) -> Self {
        Self { entries }
    }

    /// Build a pattern from stop ids, with no alighting at the first stop
    /// and no boarding at the last.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::domain::{FeedScopedId, PickDrop, StopPattern};
    ///
    /// let ids = ["A", "B", "C"].map(|s| FeedScopedId::new("F", s).unwrap());
    /// let pattern = StopPattern::from_stops(ids);
    /// assert_eq!(pattern.len(), 3);
    /// assert_eq!(pattern.entry(0).dropoff, PickDrop::None);
    /// assert_eq!(pattern.entry(1).pickup, PickDrop::Scheduled);
    /// assert_eq!(pattern.entry(2).pickup, PickDrop::None);
    /// ```
    pub fn from_stops(stops: impl IntoIterator<Item = FeedScopedId>) -> Self {
        let mut entries: Vec<StopPatternEntry> =
            stops.into_iter().map(StopPatternEntry::new).collect();
        if let Some(first) = entries.first_mut() {
            first.dropoff = PickDrop::None;
        }
        if let Some(last) = entries.last_mut() {
            last.pickup = PickDrop::None;
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> &StopPatternEntry {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[StopPatternEntry] {
        &self.entries
    }

    pub fn stop(&self, index: usize) -> &FeedScopedId {
        &self.entries[index].stop
    }

    pub fn stops(&self) -> impl Iterator<Item = &FeedScopedId> + '_ {
        self.entries.iter().map(|e| &e.stop)
    }

    pub fn first_stop(&self) -> Option<&FeedScopedId> {
        self.entries.first().map(|e| &e.stop)
    }

    pub fn last_stop(&self) -> Option<&FeedScopedId> {
        self.entries.last().map(|e| &e.stop)
    }

    pub fn into_entries(self) -> Vec<StopPatternEntry> {
        self.entries
    }
}

impl fmt::Debug for StopPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StopPattern[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(entry.stop.id())?;
        }
        f.write_str("]")
    }
}

/// Where a trip pattern came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternOrigin {
    /// Part of the static schedule.
    Scheduled,
    /// Created in real time from a scheduled pattern.
    Modified,
    /// Created in real time for an added trip.
    Added,
}

/// Error building a trip pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("trip {trip_id} has {actual} stops but pattern {pattern_id} has {expected}")]
pub struct PatternError {
    pub pattern_id: FeedScopedId,
    pub trip_id: FeedScopedId,
    pub expected: usize,
    pub actual: usize,
}

/// A stop pattern on a route, with the scheduled times of the trips on it.
#[derive(Debug)]
pub struct TripPattern {
    id: FeedScopedId,
    route: Arc<Route>,
    direction: Option<Direction>,
    mode: TransitMode,
    stop_pattern: StopPattern,
    /// Sorted by trip id.
    scheduled_times: Vec<TripTimes>,
    original: Option<Arc<TripPattern>>,
    origin: PatternOrigin,
}

impl TripPattern {
    /// A static schedule pattern. Every trip's times must have one entry
    /// per stop.
    pub fn scheduled(
        id: FeedScopedId,
        route: Arc<Route>,
        direction: Option<Direction>,
        stop_pattern: StopPattern,
        mut scheduled_times: Vec<TripTimes>,
    ) -> Result<Self, PatternError> {
        if let Some(bad) = scheduled_times
            .iter()
            .find(|t| t.num_stops() != stop_pattern.len())
        {
            return Err(PatternError {
                pattern_id: id,
                trip_id: bad.trip_id().clone(),
                expected: stop_pattern.len(),
                actual: bad.num_stops(),
            });
        }
        scheduled_times.sort_by(|a, b| a.trip_id().cmp(b.trip_id()));
        let mode = route.mode;

        Ok(Self {
            id,
            route,
            direction,
            mode,
            stop_pattern,
            scheduled_times,
            original: None,
            origin: PatternOrigin::Scheduled,
        })
    }

    /// A pattern created in real time. With an original pattern it is a
    /// modification of it, without one it serves added trips.
    pub fn real_time(
        id: FeedScopedId,
        route: Arc<Route>,
        mode: TransitMode,
        direction: Option<Direction>,
        stop_pattern: StopPattern,
        original: Option<Arc<TripPattern>>,
    ) -> Self {
        let origin = if original.is_some() {
            PatternOrigin::Modified
        } else {
            PatternOrigin::Added
        };
        Self {
            id,
            route,
            direction,
            mode,
            stop_pattern,
            scheduled_times: Vec::new(),
            original,
            origin,
        }
    }

    pub fn id(&self) -> &FeedScopedId {
        &self.id
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn mode(&self) -> TransitMode {
        self.mode
    }

    pub fn stop_pattern(&self) -> &StopPattern {
        &self.stop_pattern
    }

    pub fn num_stops(&self) -> usize {
        self.stop_pattern.len()
    }

    pub fn stop(&self, index: usize) -> &FeedScopedId {
        self.stop_pattern.stop(index)
    }

    pub fn origin(&self) -> PatternOrigin {
        self.origin
    }

    /// The scheduled pattern this one was derived from.
    pub fn original_pattern(&self) -> Option<&Arc<TripPattern>> {
        self.original.as_ref()
    }

    pub fn is_modified(&self) -> bool {
        self.origin == PatternOrigin::Modified
    }

    pub fn is_created_by_real_time(&self) -> bool {
        self.origin != PatternOrigin::Scheduled
    }

    /// Scheduled times of every trip on the pattern.
    pub fn scheduled_times(&self) -> &[TripTimes] {
        &self.scheduled_times
    }

    /// Scheduled times of one trip, if it runs on this pattern.
    pub fn scheduled_trip_times(&self, trip_id: &FeedScopedId) -> Option<&TripTimes> {
        self.scheduled_times
            .binary_search_by(|t| t.trip_id().cmp(trip_id))
            .ok()
            .map(|i| &self.scheduled_times[i])
    }
}
