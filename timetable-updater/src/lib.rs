//! Real-time trip updates for a static transit schedule.
//!
//! Parsed updates from a real-time feed are resolved against the static
//! schedule, validated, turned into new trip times and written into a
//! versioned timetable buffer. Readers see consistent snapshots of that
//! buffer while writers keep applying updates.

pub mod applier;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod fuzzy;
pub mod handlers;
pub mod pattern_cache;
pub mod resolve;
pub mod schedule;
pub mod snapshot;
pub mod update;
pub mod validate;

#[cfg(test)]
mod test_support;
