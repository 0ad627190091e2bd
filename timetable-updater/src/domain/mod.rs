//! Static schedule domain types.
//!
//! These types describe the planned timetable the real-time pipeline edits.
//! Identifiers are validated at construction, and [`TripTimes`] cannot be
//! built with times running backwards, so code that receives these types
//! can trust their validity.

mod calendar;
mod ids;
mod pattern;
mod route;
mod stop;
mod time;
mod trip;
mod trip_times;

pub use calendar::CalendarService;
pub use ids::{FeedScopedId, InvalidFeedScopedId};
pub use pattern::{PatternError, PatternOrigin, PickDrop, StopPattern, StopPatternEntry, TripPattern};
pub use route::{Agency, Route, TransitMode};
pub use stop::{Station, Stop};
pub use time::{
    SECONDS_PER_DAY, TimeError, day_offset, format_service_time, parse_service_time,
    seconds_since_start_of_service, start_of_service,
};
pub use trip::{Direction, Trip, TripOnServiceDate};
pub use trip_times::{
    OccupancyStatus, RealTimeState, RealTimeTripTimesBuilder, StopFlags, TimesError, TripTimes,
};
