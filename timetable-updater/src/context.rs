//! Everything a single update is resolved and handled against.

use crate::fuzzy::FuzzyTripMatcher;
use crate::pattern_cache::PatternCache;
use crate::schedule::StaticSchedule;
use crate::snapshot::TimetableBuffer;

/// Read-only view of the world for one update.
///
/// The buffer is the working copy as left by earlier updates in the same
/// batch, so handlers see their predecessors' results.
#[derive(Clone, Copy)]
pub struct UpdateContext<'a> {
    pub schedule: &'a StaticSchedule,
    pub buffer: &'a TimetableBuffer,
    pub fuzzy_matcher: Option<&'a dyn FuzzyTripMatcher>,
    pub pattern_cache: &'a PatternCache,
}
