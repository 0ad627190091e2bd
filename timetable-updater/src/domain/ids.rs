//! Feed-scoped identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid feed-scoped identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid feed-scoped id: {reason}")]
pub struct InvalidFeedScopedId {
    reason: &'static str,
}

/// An identifier qualified by the feed it came from.
///
/// Ids from different feeds never collide, so every schedule entity (stop,
/// route, trip, pattern) is keyed by one of these. The textual form is
/// `feed:id`; the feed part may not contain a colon, the id part may.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::FeedScopedId;
///
/// let id = FeedScopedId::new("RB", "trip-1").unwrap();
/// assert_eq!(id.to_string(), "RB:trip-1");
///
/// let parsed = FeedScopedId::parse("RB:NSR:Quay:7").unwrap();
/// assert_eq!(parsed.feed_id(), "RB");
/// assert_eq!(parsed.id(), "NSR:Quay:7");
///
/// // Both parts must be present
/// assert!(FeedScopedId::new("", "x").is_err());
/// assert!(FeedScopedId::parse("no-separator").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedScopedId {
    feed_id: String,
    id: String,
}

impl FeedScopedId {
    /// Create an identifier from its two parts.
    pub fn new(
        feed_id: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, InvalidFeedScopedId> {
        let feed_id = feed_id.into();
        let id = id.into();
        if feed_id.is_empty() {
            return Err(InvalidFeedScopedId {
                reason: "feed id cannot be empty",
            });
        }
        if feed_id.contains(':') {
            return Err(InvalidFeedScopedId {
                reason: "feed id cannot contain ':'",
            });
        }
        if id.is_empty() {
            return Err(InvalidFeedScopedId {
                reason: "id cannot be empty",
            });
        }
        Ok(Self { feed_id, id })
    }

    /// Parse the `feed:id` form, splitting on the first colon.
    pub fn parse(s: &str) -> Result<Self, InvalidFeedScopedId> {
        let (feed_id, id) = s.split_once(':').ok_or(InvalidFeedScopedId {
            reason: "expected feed:id",
        })?;
        Self::new(feed_id, id)
    }

    /// The feed part.
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// The id part, without the feed.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A new id in the same feed, with `suffix` appended to the id part.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            feed_id: self.feed_id.clone(),
            id: format!("{}{suffix}", self.id),
        }
    }
}

impl TryFrom<String> for FeedScopedId {
    type Error = InvalidFeedScopedId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FeedScopedId> for String {
    fn from(value: FeedScopedId) -> Self {
        value.to_string()
    }
}

impl fmt::Debug for FeedScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedScopedId({}:{})", self.feed_id, self.id)
    }
}

impl fmt::Display for FeedScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feed_id, self.id)
    }
}
