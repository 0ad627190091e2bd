//! Time updates for a single arrival or departure.

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::seconds_since_start_of_service;

/// A time update in seconds since start of service.
///
/// Either a delay relative to the schedule, an absolute time, or both. The
/// optional `scheduled_time` is the producer's own idea of the planned time,
/// which matters for trips whose schedule the update itself defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeUpdate {
    pub delay: Option<i32>,
    pub time: Option<i32>,
    pub scheduled_time: Option<i32>,
}

impl TimeUpdate {
    /// An update giving only a delay.
    pub fn of_delay(delay: i32) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// An update giving an absolute time, and optionally the planned one.
    pub fn of_absolute(time: i32, scheduled_time: Option<i32>) -> Self {
        Self {
            time: Some(time),
            scheduled_time,
            ..Self::default()
        }
    }

    /// The updated time for a stop scheduled at `scheduled`.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::update::TimeUpdate;
    ///
    /// assert_eq!(TimeUpdate::of_delay(300).resolve_time(36_000), 36_300);
    /// assert_eq!(TimeUpdate::of_absolute(36_120, None).resolve_time(36_000), 36_120);
    /// assert_eq!(TimeUpdate::default().resolve_time(36_000), 36_000);
    /// ```
    pub fn resolve_time(&self, scheduled: i32) -> i32 {
        match (self.time, self.delay) {
            (Some(time), _) => time,
            (None, Some(delay)) => scheduled.saturating_add(delay),
            (None, None) => scheduled,
        }
    }

    /// The delay for a stop scheduled at `scheduled`.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::update::TimeUpdate;
    ///
    /// assert_eq!(TimeUpdate::of_delay(-60).resolve_delay(36_000), -60);
    /// assert_eq!(TimeUpdate::of_absolute(36_120, None).resolve_delay(36_000), 120);
    /// ```
    pub fn resolve_delay(&self, scheduled: i32) -> i32 {
        match (self.delay, self.time) {
            (Some(delay), _) => delay,
            (None, Some(time)) => time.saturating_sub(scheduled),
            (None, None) => 0,
        }
    }

    /// True if the update carries a time or a delay.
    pub fn has_data(&self) -> bool {
        self.time.is_some() || self.delay.is_some()
    }
}

/// A time update expressed as wall-clock instants.
///
/// It cannot become a [`TimeUpdate`] until the service date is known,
/// because seconds since start of service depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeferredTimeUpdate {
    /// Expected or recorded instant.
    pub actual: Option<DateTime<FixedOffset>>,
    /// Planned instant.
    pub aimed: Option<DateTime<FixedOffset>>,
}

impl DeferredTimeUpdate {
    pub fn resolve(&self, service_date: NaiveDate, tz: Tz) -> TimeUpdate {
        let secs = |instant: DateTime<FixedOffset>| {
            seconds_since_start_of_service(instant, service_date, tz)
        };
        TimeUpdate {
            delay: None,
            time: self.actual.map(secs),
            scheduled_time: self.aimed.map(secs),
        }
    }
}

/// A time update as parsed, before or after service-date resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParsedTimeUpdate {
    Resolved(TimeUpdate),
    Deferred(DeferredTimeUpdate),
}

impl ParsedTimeUpdate {
    /// Resolve against a service date. Already-resolved updates are
    /// returned unchanged.
    pub fn resolve(&self, service_date: NaiveDate, tz: Tz) -> TimeUpdate {
        match self {
            ParsedTimeUpdate::Resolved(update) => *update,
            ParsedTimeUpdate::Deferred(deferred) => deferred.resolve(service_date, tz),
        }
    }

    /// The planned wall-clock instant, for deferred updates that have one.
    pub fn aimed_instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            ParsedTimeUpdate::Resolved(_) => None,
            ParsedTimeUpdate::Deferred(deferred) => deferred.aimed,
        }
    }
}

impl From<TimeUpdate> for ParsedTimeUpdate {
    fn from(update: TimeUpdate) -> Self {
        ParsedTimeUpdate::Resolved(update)
    }
}

impl From<DeferredTimeUpdate> for ParsedTimeUpdate {
    fn from(update: DeferredTimeUpdate) -> Self {
        ParsedTimeUpdate::Deferred(update)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A delay update resolves to scheduled plus delay
        #[test]
        fn delay_resolves_to_sum(t in 0i32..200_000, d in -7200i32..7200) {
            prop_assert_eq!(TimeUpdate::of_delay(d).resolve_time(t), t + d);
        }

        /// An absolute update reports the difference as its delay
        #[test]
        fn absolute_reports_delay(t in 0i32..200_000, d in -7200i32..7200) {
            let update = TimeUpdate::of_absolute(t + d, Some(t));
            prop_assert_eq!(update.resolve_delay(t), d);
            prop_assert_eq!(update.resolve_time(t), t + d);
        }
    }
}
