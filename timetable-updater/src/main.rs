use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use timetable_updater::applier::TripUpdateApplier;
use timetable_updater::config::UpdaterConfig;
use timetable_updater::error::UpdateResult;
use timetable_updater::fuzzy::LastStopArrivalMatcher;
use timetable_updater::schedule::load_schedule;
use timetable_updater::snapshot::SnapshotManager;
use timetable_updater::update::{ParsedTripUpdate, TripUpdateOptions};

const USAGE: &str = "usage: timetable-updater <config.json> <schedule.json> <updates.json>...";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let (Some(config_path), Some(schedule_path)) = (args.next(), args.next()) else {
        return Err(USAGE.into());
    };
    let replay_files: Vec<PathBuf> = args.collect();

    let config = UpdaterConfig::load(&config_path)?;
    let schedule = Arc::new(load_schedule(&schedule_path)?);
    info!(
        feed = schedule.feed_id(),
        trips = schedule.trips().count(),
        patterns = schedule.patterns().count(),
        "Loaded schedule"
    );
    if schedule.feed_id() != config.feed_id {
        warn!(config = %config.feed_id, schedule = schedule.feed_id(), "Feed id mismatch");
    }
    if schedule.time_zone() != config.time_zone {
        warn!(config = %config.time_zone, schedule = %schedule.time_zone(), "Time zone mismatch");
    }

    let matcher = LastStopArrivalMatcher::new(Arc::clone(&schedule)).warm_up();
    let applier = Arc::new(
        TripUpdateApplier::new(schedule, &config.pattern_cache_config())
            .with_fuzzy_matcher(Arc::new(matcher)),
    );
    let manager = Arc::new(SnapshotManager::new(config.snapshot_config()));

    // Periodic purge and commit, independent of update arrival
    let commit_manager = Arc::clone(&manager);
    let commit_interval = config.commit_interval();
    let committer = tokio::spawn(async move {
        let mut interval = tokio::time::interval(commit_interval);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            let manager = Arc::clone(&commit_manager);
            if let Err(e) = tokio::task::spawn_blocking(move || manager.purge_and_commit()).await {
                warn!(error = %e, "Commit task failed");
            }
        }
    });

    let options = config.trip_update_options();
    let mut total = UpdateResult::new();
    for path in &replay_files {
        let updates = read_batch(path, options)?;
        let batch_manager = Arc::clone(&manager);
        let batch_applier = Arc::clone(&applier);
        let result =
            tokio::task::spawn_blocking(move || batch_manager.apply_batch(&batch_applier, updates))
                .await?;
        log_result(path, &result);
        total.merge(result);
    }

    committer.abort();
    manager.purge_and_commit();
    let snapshot = manager.snapshot();
    info!(
        successful = total.successful(),
        failed = total.failed(),
        warnings = total.warnings().len(),
        generation = snapshot.generation(),
        timetables = snapshot.len(),
        "Replay finished"
    );
    Ok(())
}

/// Read one batch and apply the configured options to every update.
fn read_batch(
    path: &Path,
    options: TripUpdateOptions,
) -> Result<Vec<ParsedTripUpdate>, Box<dyn Error + Send + Sync>> {
    let json = std::fs::read_to_string(path)?;
    let updates: Vec<ParsedTripUpdate> = serde_json::from_str(&json)?;
    Ok(updates.into_iter().map(|u| u.with_options(options)).collect())
}

fn log_result(path: &Path, result: &UpdateResult) {
    info!(
        file = %path.display(),
        successful = result.successful(),
        failed = result.failed(),
        warnings = result.warnings().len(),
        "Applied batch"
    );
    for (kind, count) in result.failures_by_kind() {
        info!(file = %path.display(), %kind, count, "Failures");
    }
}
