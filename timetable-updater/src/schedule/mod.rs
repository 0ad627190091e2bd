//! The static schedule the real-time pipeline resolves against.
//!
//! A schedule is built once, either in code through [`ScheduleBuilder`] or
//! from a JSON document, and is read-only afterwards.

mod error;
mod loader;
mod model;

pub use error::ScheduleError;
pub use loader::{load_schedule, parse_schedule};
pub use model::{ScheduleBuilder, StaticSchedule};
