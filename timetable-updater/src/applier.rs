//! The single entry point from parsed updates to buffer writes.
//!
//! Every update type runs the same three stages: resolve references,
//! validate, handle. [`UpdatePipeline`] is implemented once per update
//! type and [`TripUpdateApplier`] picks the implementation with an
//! exhaustive match, so adding an update type fails to compile until it
//! has a pipeline.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::context::UpdateContext;
use crate::error::{UpdateError, UpdateErrorKind};
use crate::fuzzy::FuzzyTripMatcher;
use crate::handlers::{self, AppliedUpdate};
use crate::pattern_cache::{PatternCache, PatternCacheConfig};
use crate::resolve::{self, ResolvedExistingTrip, ResolvedNewTrip, ResolvedTripRemoval};
use crate::schedule::StaticSchedule;
use crate::snapshot::TimetableBuffer;
use crate::update::{ParsedTripUpdate, UpdateType};
use crate::validate;

/// Resolve, validate and handle one kind of update.
pub trait UpdatePipeline {
    /// What resolution produces: only the fields this update type needs.
    type Resolved<'u>;

    fn resolve<'u>(
        update: &'u ParsedTripUpdate,
        ctx: &UpdateContext<'_>,
    ) -> Result<Self::Resolved<'u>, UpdateError>;

    fn validate(resolved: &Self::Resolved<'_>, ctx: &UpdateContext<'_>) -> Result<(), UpdateError>;

    fn handle(
        resolved: Self::Resolved<'_>,
        ctx: &UpdateContext<'_>,
    ) -> Result<AppliedUpdate, UpdateError>;
}

/// UPDATE_EXISTING.
pub struct UpdateExisting;

impl UpdatePipeline for UpdateExisting {
    type Resolved<'u> = ResolvedExistingTrip<'u>;

    fn resolve<'u>(
        update: &'u ParsedTripUpdate,
        ctx: &UpdateContext<'_>,
    ) -> Result<Self::Resolved<'u>, UpdateError> {
        resolve::resolve_existing(update, ctx)
    }

    fn validate(resolved: &Self::Resolved<'_>, _ctx: &UpdateContext<'_>) -> Result<(), UpdateError> {
        validate::validate_existing(resolved)
    }

    fn handle(
        resolved: Self::Resolved<'_>,
        ctx: &UpdateContext<'_>,
    ) -> Result<AppliedUpdate, UpdateError> {
        handlers::handle_update_existing(resolved, ctx)
    }
}

/// MODIFY_TRIP.
pub struct ModifyTrip;

impl UpdatePipeline for ModifyTrip {
    type Resolved<'u> = ResolvedExistingTrip<'u>;

    fn resolve<'u>(
        update: &'u ParsedTripUpdate,
        ctx: &UpdateContext<'_>,
    ) -> Result<Self::Resolved<'u>, UpdateError> {
        resolve::resolve_existing(update, ctx)
    }

    fn validate(resolved: &Self::Resolved<'_>, ctx: &UpdateContext<'_>) -> Result<(), UpdateError> {
        validate::validate_modify(resolved, ctx)
    }

    fn handle(
        resolved: Self::Resolved<'_>,
        ctx: &UpdateContext<'_>,
    ) -> Result<AppliedUpdate, UpdateError> {
        handlers::handle_modify(resolved, ctx)
    }
}

/// ADD_NEW_TRIP.
pub struct AddNewTrip;

impl UpdatePipeline for AddNewTrip {
    type Resolved<'u> = ResolvedNewTrip<'u>;

    fn resolve<'u>(
        update: &'u ParsedTripUpdate,
        ctx: &UpdateContext<'_>,
    ) -> Result<Self::Resolved<'u>, UpdateError> {
        resolve::resolve_new_trip(update, ctx)
    }

    fn validate(resolved: &Self::Resolved<'_>, _ctx: &UpdateContext<'_>) -> Result<(), UpdateError> {
        validate::validate_new_trip(resolved)
    }

    fn handle(
        resolved: Self::Resolved<'_>,
        ctx: &UpdateContext<'_>,
    ) -> Result<AppliedUpdate, UpdateError> {
        handlers::handle_add_new(resolved, ctx)
    }
}

/// CANCEL_TRIP and DELETE_TRIP.
pub struct RemoveTrip;

impl UpdatePipeline for RemoveTrip {
    type Resolved<'u> = ResolvedTripRemoval<'u>;

    fn resolve<'u>(
        update: &'u ParsedTripUpdate,
        ctx: &UpdateContext<'_>,
    ) -> Result<Self::Resolved<'u>, UpdateError> {
        resolve::resolve_removal(update, ctx)
    }

    fn validate(_resolved: &Self::Resolved<'_>, _ctx: &UpdateContext<'_>) -> Result<(), UpdateError> {
        Ok(())
    }

    fn handle(
        resolved: Self::Resolved<'_>,
        ctx: &UpdateContext<'_>,
    ) -> Result<AppliedUpdate, UpdateError> {
        handlers::handle_removal(resolved, ctx)
    }
}

fn run<P: UpdatePipeline>(
    update: &ParsedTripUpdate,
    ctx: &UpdateContext<'_>,
) -> Result<AppliedUpdate, UpdateError> {
    let resolved = P::resolve(update, ctx)?;
    P::validate(&resolved, ctx)?;
    P::handle(resolved, ctx)
}

fn dispatch(update: &ParsedTripUpdate, ctx: &UpdateContext<'_>) -> Result<AppliedUpdate, UpdateError> {
    match update.update_type() {
        UpdateType::UpdateExisting => run::<UpdateExisting>(update, ctx),
        UpdateType::ModifyTrip => run::<ModifyTrip>(update, ctx),
        UpdateType::AddNewTrip => run::<AddNewTrip>(update, ctx),
        UpdateType::CancelTrip | UpdateType::DeleteTrip => run::<RemoveTrip>(update, ctx),
    }
}

/// Applies parsed updates against one static schedule.
///
/// The applier owns what is shared across batches (the schedule, the
/// pattern cache, the fuzzy matcher) and reads the working buffer it is
/// given. It never writes to the buffer itself.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chrono::NaiveDate;
/// use timetable_updater::applier::TripUpdateApplier;
/// use timetable_updater::domain::FeedScopedId;
/// use timetable_updater::error::UpdateErrorKind;
/// use timetable_updater::pattern_cache::PatternCacheConfig;
/// use timetable_updater::schedule::ScheduleBuilder;
/// use timetable_updater::snapshot::TimetableBuffer;
/// use timetable_updater::update::{ParsedTripUpdate, TripReference, UpdateType};
///
/// let schedule = ScheduleBuilder::new("F", chrono_tz::Europe::Oslo).build().unwrap();
/// let applier = TripUpdateApplier::new(Arc::new(schedule), &PatternCacheConfig::default());
///
/// let trip = FeedScopedId::new("F", "missing").unwrap();
/// let update = ParsedTripUpdate::builder(UpdateType::CancelTrip, TripReference::by_trip_id(trip))
///     .service_date(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap())
///     .build();
/// let err = applier.apply(&update, &TimetableBuffer::new()).unwrap_err();
/// assert_eq!(err.kind(), UpdateErrorKind::NoTripForCancellationFound);
/// ```
pub struct TripUpdateApplier {
    schedule: Arc<StaticSchedule>,
    pattern_cache: PatternCache,
    fuzzy_matcher: Option<Arc<dyn FuzzyTripMatcher>>,
}

impl TripUpdateApplier {
    pub fn new(schedule: Arc<StaticSchedule>, cache_config: &PatternCacheConfig) -> Self {
        Self {
            schedule,
            pattern_cache: PatternCache::new(cache_config),
            fuzzy_matcher: None,
        }
    }

    /// Use a fuzzy matcher for updates that allow it.
    pub fn with_fuzzy_matcher(mut self, matcher: Arc<dyn FuzzyTripMatcher>) -> Self {
        self.fuzzy_matcher = Some(matcher);
        self
    }

    pub fn schedule(&self) -> &Arc<StaticSchedule> {
        &self.schedule
    }

    pub fn pattern_cache(&self) -> &PatternCache {
        &self.pattern_cache
    }

    /// Resolve, validate and handle one update against `buffer`.
    ///
    /// Errors carry the update's trip id and data source. A panic anywhere
    /// in the pipeline becomes an [`UpdateErrorKind::Unknown`] failure for
    /// this update alone.
    pub fn apply(
        &self,
        update: &ParsedTripUpdate,
        buffer: &TimetableBuffer,
    ) -> Result<AppliedUpdate, UpdateError> {
        let ctx = UpdateContext {
            schedule: &self.schedule,
            buffer,
            fuzzy_matcher: self.fuzzy_matcher.as_deref(),
            pattern_cache: &self.pattern_cache,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(update, &ctx)));
        let result = outcome.unwrap_or_else(|_| {
            error!(trip = ?update.trip_id(), kind = %update.update_type(), "Panic while applying update");
            Err(UpdateError::new(None, UpdateErrorKind::Unknown))
        });

        result.map_err(|err| {
            let err = err
                .with_trip_id_if_missing(update.trip_id())
                .with_data_source(update.data_source());
            debug!(
                trip = ?err.trip_id(),
                kind = %err.kind(),
                source = ?update.data_source(),
                update_type = %update.update_type(),
                "Update rejected"
            );
            err
        })
    }
}
