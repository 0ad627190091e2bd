//! Deduplication of trip patterns created in real time.
//!
//! Modified and added trips need a pattern for their stop sequence. Every
//! trip with the same stops on the same route must share one pattern, or
//! the planner would see a new pattern per trip and per update. Patterns
//! from the static schedule win over cached ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use moka::sync::Cache as MokaCache;
use tracing::debug;

use crate::domain::{Direction, FeedScopedId, Route, StopPattern, TransitMode, TripPattern};
use crate::schedule::StaticSchedule;

/// Cache key: route and stop sequence.
type PatternKey = (FeedScopedId, StopPattern);

/// Configuration for the pattern cache.
///
/// The cache is never bounded: evicting a pattern would let the next
/// request for the same stops create a duplicate.
#[derive(Debug, Clone)]
pub struct PatternCacheConfig {
    /// Number of patterns to reserve room for up front.
    pub initial_capacity: usize,
}

impl Default for PatternCacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1_024,
        }
    }
}

/// The outcome of a pattern request.
#[derive(Debug, Clone)]
pub struct PatternLookup {
    pub pattern: Arc<TripPattern>,
    /// True if an existing pattern (static or cached) was returned.
    pub reused: bool,
}

/// Everything needed to create a pattern if none exists yet.
#[derive(Debug, Clone)]
pub struct PatternRequest<'a> {
    pub route: &'a Arc<Route>,
    pub mode: TransitMode,
    pub direction: Option<Direction>,
    pub stop_pattern: StopPattern,
    /// The scheduled pattern being modified, or `None` for added trips.
    pub original: Option<&'a Arc<TripPattern>>,
}

/// Thread-safe cache of real-time patterns.
///
/// Concurrent requests for the same route and stop sequence converge on a
/// single instance: only the first caller's pattern is created, the others
/// wait for it and share it.
pub struct PatternCache {
    patterns: MokaCache<PatternKey, Arc<TripPattern>>,
    by_route: RwLock<HashMap<FeedScopedId, Vec<Arc<TripPattern>>>>,
    counter: AtomicU64,
}

impl PatternCache {
    pub fn new(config: &PatternCacheConfig) -> Self {
        Self {
            patterns: MokaCache::builder()
                .initial_capacity(config.initial_capacity)
                .build(),
            by_route: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Return the pattern for a stop sequence on a route, creating it if
    /// neither the schedule nor the cache has one.
    pub fn get_or_create(&self, schedule: &StaticSchedule, request: PatternRequest<'_>) -> PatternLookup {
        if let Some(original) = request
            .original
            .filter(|o| o.stop_pattern() == &request.stop_pattern)
        {
            return PatternLookup {
                pattern: Arc::clone(original),
                reused: true,
            };
        }
        if let Some(existing) = schedule
            .patterns_for_route(&request.route.id)
            .iter()
            .find(|p| p.stop_pattern() == &request.stop_pattern)
        {
            return PatternLookup {
                pattern: Arc::clone(existing),
                reused: true,
            };
        }

        let key = (request.route.id.clone(), request.stop_pattern.clone());
        let mut created = false;
        let pattern = self.patterns.get_with(key, || {
            created = true;
            let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            let id = request.route.id.with_suffix(&format!(":RT{n}"));
            debug!(pattern = %id, route = %request.route.id, stops = request.stop_pattern.len(), "Created real-time pattern");
            Arc::new(TripPattern::real_time(
                id,
                Arc::clone(request.route),
                request.mode,
                request.direction,
                request.stop_pattern.clone(),
                request.original.cloned(),
            ))
        });

        if created {
            self.by_route
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(request.route.id.clone())
                .or_default()
                .push(Arc::clone(&pattern));
        }

        PatternLookup {
            pattern,
            reused: !created,
        }
    }

    /// Real-time patterns created for a route, oldest first.
    pub fn patterns_for_route(&self, route_id: &FeedScopedId) -> Vec<Arc<TripPattern>> {
        self.by_route
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(route_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of patterns created so far.
    pub fn created(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(&PatternCacheConfig::default())
    }
}
