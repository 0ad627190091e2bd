//! Stops and stations.

use super::FeedScopedId;

/// A station grouping one or more stops (platforms, quays).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: FeedScopedId,
    pub name: String,
}

/// A place where vehicles call.
///
/// Stops may belong to a parent station. Two stops sharing a parent are
/// interchangeable for the purposes of stop replacement and fuzzy matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub id: FeedScopedId,
    pub name: String,
    pub parent_station: Option<FeedScopedId>,
}

impl Stop {
    /// Create a stop without a parent station.
    pub fn new(id: FeedScopedId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_station: None,
        }
    }

    /// Attach this stop to a parent station.
    pub fn with_parent_station(mut self, station: FeedScopedId) -> Self {
        self.parent_station = Some(station);
        self
    }

    /// True if both stops have a parent station and it is the same one.
    pub fn shares_station_with(&self, other: &Stop) -> bool {
        match (&self.parent_station, &other.parent_station) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// True if `other` is this stop or one of its siblings.
    pub fn is_same_or_sibling(&self, other: &Stop) -> bool {
        self.id == other.id || self.shares_station_with(other)
    }
}
