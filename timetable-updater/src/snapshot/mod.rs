//! Versioned real-time timetables.
//!
//! Handlers produce [`RealTimeTripUpdate`]s which are written into a single
//! mutable [`TimetableBuffer`]. The [`SnapshotManager`] periodically freezes
//! the buffer into an immutable [`TimetableSnapshot`] that readers share.

mod buffer;
mod manager;
mod real_time_update;
mod published;
mod timetable;

pub use buffer::{BufferError, TimetableBuffer};
pub use manager::{Clock, SnapshotConfig, SnapshotManager};
pub use real_time_update::{AddedTrip, RealTimeTripUpdate};
pub use published::TimetableSnapshot;
pub use timetable::{Timetable, TimetableKey};
