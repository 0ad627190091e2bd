//! Service calendars.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use super::FeedScopedId;

/// Maps service ids to the dates they run on.
#[derive(Debug, Clone, Default)]
pub struct CalendarService {
    dates: HashMap<FeedScopedId, BTreeSet<NaiveDate>>,
}

impl CalendarService {
    /// Create an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `service_id` as running on `date`.
    pub fn add(&mut self, service_id: FeedScopedId, date: NaiveDate) {
        self.dates.entry(service_id).or_default().insert(date);
    }

    /// True if the service runs on the date.
    pub fn is_active(&self, service_id: &FeedScopedId, date: NaiveDate) -> bool {
        self.dates
            .get(service_id)
            .is_some_and(|dates| dates.contains(&date))
    }

    /// All dates the service runs on, in order.
    pub fn dates_for(&self, service_id: &FeedScopedId) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.get(service_id).into_iter().flatten().copied()
    }

    /// Number of known services.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// True if no services are known.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
