//! Turning resolved updates into buffer writes.
//!
//! Handlers never touch the buffer. Each returns a [`RealTimeTripUpdate`]
//! describing the write, which the snapshot manager applies.

mod add_new;
mod modify;
mod removal;
mod stop_times;
mod update_existing;

pub use add_new::{FALLBACK_AGENCY_ID, handle_add_new};
pub use modify::handle_modify;
pub use removal::handle_removal;
pub use update_existing::handle_update_existing;

use crate::error::UpdateWarning;
use crate::snapshot::RealTimeTripUpdate;

/// A successfully handled update, ready for the buffer.
#[derive(Debug, Clone)]
pub struct AppliedUpdate {
    pub update: RealTimeTripUpdate,
    pub warnings: Vec<UpdateWarning>,
}

impl AppliedUpdate {
    pub fn new(update: RealTimeTripUpdate) -> Self {
        Self {
            update,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<UpdateWarning>) -> Self {
        self.warnings = warnings;
        self
    }
}
