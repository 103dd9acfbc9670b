//! Generation orchestration.

use crate::allocation::allocate;
use crate::config::{AppConfig, GeneratorConfig, ReportingWindow};
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::loader::{LoadReport, Loader};
use crate::producer::{plan_work, BatchProducer};
use parcelsim_core::Layout;
use parcelsim_store::{provision, Store};
use tracing::info;

/// Provision and populate one container.
///
/// Configuration problems are reported before anything is written. Once
/// chunks are dispatched, failures end up in the report instead.
pub fn run_generation<S: Store>(store: &S, config: &GeneratorConfig, progress: bool) -> Result<LoadReport> {
    config.validate()?;
    let window_days = config.effective_window_days();

    let plan = allocate(
        config.total_volume,
        window_days,
        &config.partitions,
        &config.allocation,
    )?;
    plan.validate()?;

    info!(
        container = %config.container,
        layout = %config.layout,
        window_days,
        total = config.total_volume,
        partitions = plan.allocations.len(),
        tail = plan.tail_count(),
        "Planned population"
    );

    let producer = BatchProducer::new(config.layout, config.window)
        .with_lifecycle(Lifecycle::new(config.lifecycle)?)
        .with_payload(config.payload.provider())
        .with_id_format(config.ids.clone());
    let items = plan_work(&plan, config.pool.effective_batch_size());

    {
        let mut session = store.open_session()?;
        provision(&mut session, &config.container, config.layout)?;
    }

    Loader::new(producer, config.pool.clone())
        .with_progress(progress)
        .run(store, &config.container, items)
}

/// Populate every window for every layout, one container at a time
pub fn run_windows<S: Store>(
    store: &S,
    app: &AppConfig,
    windows: &[ReportingWindow],
    layouts: &[Layout],
    progress: bool,
) -> Result<Vec<LoadReport>> {
    let mut reports = Vec::with_capacity(windows.len() * layouts.len());
    for window in windows {
        for layout in layouts {
            let config = GeneratorConfig::for_window(&app.generator, window, *layout)?;
            reports.push(run_generation(store, &config, progress)?);
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::FixedPartition;
    use crate::error::GenerateError;
    use chrono::{TimeZone, Utc};
    use parcelsim_core::{PoolConfig, TimeWindow};
    use parcelsim_store::{MemoryStore, Session};

    fn week() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 7, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_volume_conflict_writes_nothing() {
        let store = MemoryStore::new();
        let config = GeneratorConfig::new("summary_1_week", Layout::AppendOnly, week(), 10)
            .with_partitions(vec![FixedPartition::new(1_000_011, 500)]);

        let err = run_generation(&store, &config, false).unwrap_err();
        assert!(matches!(err, GenerateError::VolumeConflict { .. }));
        assert!(err.is_config());
        assert!(store.container_names().is_empty());
    }

    #[test]
    fn test_run_windows_creates_each_container() {
        let store = MemoryStore::new();
        let mut app = AppConfig::standard();
        app.generator.partitions = vec![FixedPartition::new(1_000_011, 31)];
        app.generator.pool = PoolConfig::new().with_workers(2).with_batch_size(25);
        let mut window = ReportingWindow::standard()[0].clone();
        window.total_volume = 60;
        let windows = vec![window];

        let reports = run_windows(
            &store,
            &app,
            &windows,
            &[Layout::FlatSnapshot, Layout::AppendOnly],
            false,
        )
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.is_complete()));
        let session = store.open_session().unwrap();
        assert_eq!(session.count_documents("summary_flat_1_week").unwrap(), 60);
        assert!(session.count_documents("summary_1_week").unwrap() >= 120);
    }
}
