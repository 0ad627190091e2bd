//! Turning references in an update into schedule entities.
//!
//! Resolution is pure: it reads the static schedule and the working
//! buffer and never changes either. Each update type gets a resolved
//! bundle holding only what its handler needs.

mod existing;
mod new_trip;
mod removal;
mod service_date;
mod stop;
mod trip;

pub use existing::{ResolvedExistingTrip, resolve_existing};
pub use new_trip::{PreviouslyAddedTrip, ResolvedNewTrip, resolve_new_trip};
pub use removal::{ResolvedTripRemoval, ScheduledRemoval, resolve_removal};
pub use service_date::resolve_service_date;
pub use stop::{ResolvedStopTimeUpdate, resolve_stop};
pub use trip::resolve_trip;
