//! Single-writer buffer ownership and snapshot publication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{Days, Local, NaiveDate};
use tracing::{debug, error, info};

use crate::applier::TripUpdateApplier;
use crate::error::{UpdateError, UpdateErrorKind, UpdateResult};
use crate::update::ParsedTripUpdate;

use super::buffer::TimetableBuffer;
use super::published::TimetableSnapshot;

/// Source of "today" for purging. Injected so tests can move time.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Configuration for snapshot publication.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Drop service dates before yesterday on purge.
    pub purge_expired_data: bool,

    /// Minimum time between two unforced commits.
    pub max_snapshot_frequency: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            purge_expired_data: true,
            max_snapshot_frequency: Duration::from_secs(1),
        }
    }
}

struct WriterState {
    buffer: TimetableBuffer,
    last_commit: Option<Instant>,
    last_purge: Option<NaiveDate>,
}

/// Owns the buffer and publishes snapshots of it.
///
/// Writers are serialised by a mutex around the buffer. Readers take an
/// `Arc` of the latest snapshot and are never blocked by writers for longer
/// than the pointer swap.
///
/// # Examples
///
/// ```
/// use timetable_updater::snapshot::{SnapshotConfig, SnapshotManager};
///
/// let manager = SnapshotManager::new(SnapshotConfig::default());
/// let before = manager.snapshot();
/// assert_eq!(before.generation(), 0);
///
/// // Nothing changed, so nothing is published
/// assert!(!manager.force_commit());
/// assert_eq!(manager.snapshot().generation(), 0);
/// ```
pub struct SnapshotManager {
    config: SnapshotConfig,
    writer: Mutex<WriterState>,
    published: RwLock<Arc<TimetableSnapshot>>,
    generation: AtomicU64,
    clock: Clock,
}

impl SnapshotManager {
    pub fn new(config: SnapshotConfig) -> Self {
        Self::with_clock(config, Arc::new(|| Local::now().date_naive()))
    }

    pub fn with_clock(config: SnapshotConfig, clock: Clock) -> Self {
        Self {
            config,
            writer: Mutex::new(WriterState {
                buffer: TimetableBuffer::new(),
                last_commit: None,
                last_purge: None,
            }),
            published: RwLock::new(Arc::new(TimetableSnapshot::default())),
            generation: AtomicU64::new(0),
            clock,
        }
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<TimetableSnapshot> {
        Arc::clone(&self.published.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run a closure against the working buffer while holding the writer
    /// lock.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut TimetableBuffer) -> R) -> R {
        f(&mut self.lock_writer().buffer)
    }

    /// Apply a batch of updates in order, then commit if one is due.
    ///
    /// Each update is resolved against the buffer as left by the previous
    /// one, so updates to the same trip must arrive in feed order.
    pub fn apply_batch<I>(&self, applier: &TripUpdateApplier, updates: I) -> UpdateResult
    where
        I: IntoIterator<Item = ParsedTripUpdate>,
    {
        let mut result = UpdateResult::new();
        let mut writer = self.lock_writer();

        for update in updates {
            let applied = match applier.apply(&update, &writer.buffer) {
                Ok(applied) => applied,
                Err(err) => {
                    result.record_failure(err);
                    continue;
                }
            };
            let trip_id = applied.update.trip_times().trip_id().clone();
            match writer.buffer.apply(applied.update) {
                Ok(()) => result.record_success(&applied.warnings),
                Err(err) => {
                    error!(trip = %trip_id, error = %err, "Buffer rejected update");
                    result.record_failure(
                        UpdateError::for_trip(&trip_id, UpdateErrorKind::Unknown)
                            .with_data_source(update.data_source()),
                    );
                }
            }
        }

        debug!(
            successful = result.successful(),
            failed = result.failed(),
            "Applied update batch"
        );
        self.commit_locked(&mut writer, false);
        result
    }

    /// Publish the buffer if it changed and the last commit is old enough.
    pub fn commit(&self) -> bool {
        let mut writer = self.lock_writer();
        self.commit_locked(&mut writer, false)
    }

    /// Publish the buffer if it changed, ignoring the frequency limit.
    pub fn force_commit(&self) -> bool {
        let mut writer = self.lock_writer();
        self.commit_locked(&mut writer, true)
    }

    /// Purge expired service dates if configured, then force a commit.
    pub fn purge_and_commit(&self) -> bool {
        let mut writer = self.lock_writer();
        if self.config.purge_expired_data {
            let today = (self.clock)();
            if writer.last_purge != Some(today) {
                let cutoff = today.checked_sub_days(Days::new(1)).unwrap_or(today);
                let purged = writer.buffer.purge_before(cutoff);
                writer.last_purge = Some(today);
                if purged > 0 {
                    info!(purged, %cutoff, "Purged expired timetables");
                }
            }
        }
        self.commit_locked(&mut writer, true)
    }

    /// Drop all real-time state and publish the empty result.
    pub fn clear(&self) {
        let mut writer = self.lock_writer();
        writer.buffer.clear();
        self.commit_locked(&mut writer, true);
    }

    fn commit_locked(&self, writer: &mut WriterState, force: bool) -> bool {
        if !writer.buffer.is_dirty() {
            return false;
        }
        if !force
            && writer
                .last_commit
                .is_some_and(|t| t.elapsed() < self.config.max_snapshot_frequency)
        {
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(writer.buffer.freeze(generation));
        info!(generation, timetables = snapshot.len(), "Published timetable snapshot");
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        writer.last_commit = Some(Instant::now());
        true
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::RealTimeState;
    use crate::pattern_cache::PatternCacheConfig;
    use crate::test_support::{Network, date, delay, hms, id, update};
    use crate::update::{TripReference, UpdateType};

    fn applier(network: &Network) -> TripUpdateApplier {
        TripUpdateApplier::new(Arc::clone(&network.schedule), &PatternCacheConfig::default())
    }

    fn throttled() -> SnapshotConfig {
        SnapshotConfig {
            max_snapshot_frequency: Duration::from_secs(3600),
            ..SnapshotConfig::default()
        }
    }

    #[test]
    fn default_config() {
        let config = SnapshotConfig::default();
        assert!(config.purge_expired_data);
        assert_eq!(config.max_snapshot_frequency, Duration::from_secs(1));
    }

    #[test]
    fn published_snapshot_is_isolated() {
        let network = Network::abc();
        let applier = applier(&network);
        let manager = SnapshotManager::new(SnapshotConfig::default());
        let p1 = network.schedule.pattern(&id("P1")).unwrap();

        let result = manager.apply_batch(
            &applier,
            [update(UpdateType::UpdateExisting, "T1", vec![delay("B", 60)])],
        );
        assert_eq!(result.successful(), 1);
        let first = manager.snapshot();
        assert_eq!(first.generation(), 1);

        manager.apply_batch(
            &applier,
            [update(UpdateType::UpdateExisting, "T1", vec![delay("B", 600)])],
        );
        manager.force_commit();
        let second = manager.snapshot();

        assert_eq!(second.generation(), 2);
        assert_eq!(first.trip_times(p1, date(), &id("T1")).unwrap().arrival(1), hms(10, 31, 0));
        assert_eq!(second.trip_times(p1, date(), &id("T1")).unwrap().arrival(1), hms(10, 40, 0));
    }

    #[test]
    fn readers_share_one_snapshot() {
        let manager = SnapshotManager::new(SnapshotConfig::default());
        assert!(Arc::ptr_eq(&manager.snapshot(), &manager.snapshot()));
    }

    #[test]
    fn commits_are_throttled_unless_forced() {
        let network = Network::abc();
        let applier = applier(&network);
        let manager = SnapshotManager::new(throttled());

        manager.apply_batch(
            &applier,
            [update(UpdateType::UpdateExisting, "T1", vec![delay("B", 60)])],
        );
        assert_eq!(manager.snapshot().generation(), 1);

        manager.apply_batch(&applier, [update(UpdateType::CancelTrip, "T3", vec![])]);
        assert_eq!(manager.snapshot().generation(), 1);
        assert!(!manager.commit());

        assert!(manager.force_commit());
        assert_eq!(manager.snapshot().generation(), 2);
        // Nothing left to publish
        assert!(!manager.force_commit());
    }

    #[test]
    fn failed_update_leaves_buffer_untouched() {
        let network = Network::abc();
        let applier = applier(&network);
        let manager = SnapshotManager::new(SnapshotConfig::default());

        let result = manager.apply_batch(
            &applier,
            [
                update(UpdateType::CancelTrip, "NOPE", vec![]),
                update(UpdateType::UpdateExisting, "NOPE", vec![delay("B", 60)]),
            ],
        );

        assert_eq!(result.successful(), 0);
        assert_eq!(result.failures_of(UpdateErrorKind::NoTripForCancellationFound), 1);
        assert_eq!(result.failures_of(UpdateErrorKind::TripNotFound), 1);
        assert!(!manager.with_buffer(|buffer| buffer.is_dirty()));
        assert_eq!(manager.snapshot().generation(), 0);
    }

    #[test]
    fn batch_sees_earlier_updates() {
        let network = Network::abc();
        let applier = applier(&network);
        let manager = SnapshotManager::new(SnapshotConfig::default());
        let p1 = network.schedule.pattern(&id("P1")).unwrap();

        let result = manager.apply_batch(
            &applier,
            [
                update(UpdateType::UpdateExisting, "T1", vec![delay("B", 60)]),
                update(UpdateType::CancelTrip, "T1", vec![]),
            ],
        );
        assert_eq!(result.successful(), 2);
        let snapshot = manager.snapshot();
        assert_eq!(
            snapshot.trip_times(p1, date(), &id("T1")).unwrap().state(),
            RealTimeState::Canceled
        );
    }

    #[test]
    fn purge_uses_clock() {
        let network = Network::abc();
        let applier = applier(&network);
        let today = Arc::new(Mutex::new(date()));
        let clock_today = Arc::clone(&today);
        let manager = SnapshotManager::with_clock(
            throttled(),
            Arc::new(move || *clock_today.lock().unwrap()),
        );
        let tomorrow = date().succ_opt().unwrap();

        let tomorrows =
            ParsedTripUpdate::builder(UpdateType::UpdateExisting, TripReference::by_trip_id(id("T1")))
                .service_date(tomorrow)
                .stop_time_update(delay("B", 60))
                .build();
        manager.apply_batch(
            &applier,
            [update(UpdateType::UpdateExisting, "T1", vec![delay("B", 60)]), tomorrows],
        );
        assert_eq!(manager.snapshot().service_dates(), vec![date(), tomorrow]);

        // Yesterday is kept
        *today.lock().unwrap() = tomorrow;
        assert!(!manager.purge_and_commit());
        assert_eq!(manager.snapshot().service_dates(), vec![date(), tomorrow]);

        *today.lock().unwrap() = tomorrow.succ_opt().unwrap();
        assert!(manager.purge_and_commit());
        assert_eq!(manager.snapshot().service_dates(), vec![tomorrow]);
    }

    #[test]
    fn purge_can_be_disabled() {
        let network = Network::abc();
        let applier = applier(&network);
        let far_future = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let manager = SnapshotManager::with_clock(
            SnapshotConfig {
                purge_expired_data: false,
                ..SnapshotConfig::default()
            },
            Arc::new(move || far_future),
        );
        manager.apply_batch(
            &applier,
            [update(UpdateType::UpdateExisting, "T1", vec![delay("B", 60)])],
        );
        assert!(!manager.purge_and_commit());
        assert_eq!(manager.snapshot().len(), 1);
    }

    #[test]
    fn clear_publishes_empty_snapshot() {
        let network = Network::abc();
        let applier = applier(&network);
        let manager = SnapshotManager::new(SnapshotConfig::default());
        manager.apply_batch(
            &applier,
            [update(UpdateType::UpdateExisting, "T1", vec![delay("B", 60)])],
        );
        assert_eq!(manager.snapshot().len(), 1);

        manager.clear();
        assert!(manager.snapshot().is_empty());
        assert_eq!(manager.snapshot().generation(), 2);
    }
}
