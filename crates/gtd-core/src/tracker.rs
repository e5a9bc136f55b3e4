//! The tracker facade: filters, live views and mutations over one database.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::coordinator::{self, TagKind};
use crate::filter::{self, normalize, FilterKey};
use crate::heartbeat::Heartbeat;
use crate::live::{live_query, LiveView, QueryFn};
use crate::projection::{project, StepView};
use crate::store::{Store, Table};
use crate::timer;
use gtd_local_db::{
    Connection, Database, ProjectId, ProjectRecord, ProjectStore, RegistryStore, StepId, StepRecord, StepStore,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Entry point for collaborators: owns the store, the filter state and the
/// shared heartbeat.
pub struct Tracker {
    store: Store,
    filter: watch::Sender<FilterKey>,
    heartbeat: Heartbeat,
    clock: Arc<dyn Clock>,
    step_locks: Mutex<HashMap<StepId, Arc<tokio::sync::Mutex<()>>>>,
    shutdown: CancellationToken,
}

impl Tracker {
    /// Open (creating and migrating if needed) the configured database.
    ///
    /// Any failure to open or migrate is reported as `StoreUnavailable`.
    pub fn open(config: &Config) -> crate::Result<Self> {
        let path = config.resolved_database_path()?;
        let db = Database::open_with_policy(&path, config.migration_policy()).map_err(|e| {
            crate::Error::store_unavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), outcome = ?db.migration_outcome(), "tracker database opened");
        Ok(Self::with_database(db, config, Arc::new(SystemClock)))
    }

    /// Tracker over a fresh in-memory database.
    pub fn open_in_memory(config: &Config, clock: Arc<dyn Clock>) -> crate::Result<Self> {
        let db = Database::open_in_memory().map_err(|e| crate::Error::store_unavailable(e.to_string()))?;
        Ok(Self::with_database(db, config, clock))
    }

    pub fn with_database(db: Database, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let shutdown = CancellationToken::new();
        let (filter, _) = watch::channel(FilterKey {
            demo_mode: config.demo_mode,
            ..FilterKey::default()
        });
        Self {
            store: Store::new(db),
            filter,
            heartbeat: Heartbeat::new(config.heartbeat_period(), &shutdown),
            clock,
            step_locks: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// Stop every live view and background task created by this tracker.
    pub fn shutdown(&self) {
        info!("tracker shutting down");
        self.shutdown.cancel();
    }

    // Filters

    pub fn filter_key(&self) -> FilterKey {
        self.filter.borrow().clone()
    }

    pub fn demo_mode(&self) -> bool {
        self.filter.borrow().demo_mode
    }

    pub fn set_demo_mode(&self, demo_mode: bool) {
        self.filter.send_if_modified(|key| set_if_changed(&mut key.demo_mode, demo_mode));
    }

    /// Filter projects by category; `None` or a blank name clears the filter.
    pub fn set_category_filter(&self, category: Option<String>) {
        let category = normalize(category);
        self.filter.send_if_modified(|key| set_if_changed(&mut key.category, category));
    }

    /// Filter projects by status; `None` or a blank name clears the filter.
    pub fn set_status_filter(&self, status: Option<String>) {
        let status = normalize(status);
        self.filter.send_if_modified(|key| set_if_changed(&mut key.status, status));
    }

    // Live views

    /// Projects of the current partition matching the current filters.
    pub async fn projects(&self) -> crate::Result<LiveView<Vec<ProjectRecord>>> {
        filter::filtered_projects(self.store.clone(), self.filter.subscribe(), &self.shutdown).await
    }

    /// Steps of a project with live elapsed seconds.
    pub async fn steps_for_project(&self, project_id: ProjectId) -> crate::Result<LiveView<Vec<StepView>>> {
        let query: QueryFn<Vec<StepRecord>> =
            Arc::new(move |conn: &Connection| StepStore::new(conn).list_for_project(project_id));
        let source = live_query(&self.store, &[Table::Steps], query, &self.shutdown).await?;
        Ok(project(source, self.heartbeat.clone(), self.clock.clone(), &self.shutdown))
    }

    /// A single step with live elapsed seconds; `None` once it is deleted.
    pub async fn watch_step(&self, id: StepId) -> crate::Result<LiveView<Option<StepView>>> {
        let query: QueryFn<Option<StepRecord>> =
            Arc::new(move |conn: &Connection| StepStore::new(conn).get(id));
        let source = live_query(&self.store, &[Table::Steps], query, &self.shutdown).await?;
        Ok(project(source, self.heartbeat.clone(), self.clock.clone(), &self.shutdown))
    }

    /// Registered category names, for autocomplete.
    pub async fn category_names(&self) -> crate::Result<LiveView<Vec<String>>> {
        let query: QueryFn<Vec<String>> =
            Arc::new(|conn: &Connection| RegistryStore::categories(conn).names());
        live_query(&self.store, &[Table::Categories], query, &self.shutdown).await
    }

    /// Registered status names, for autocomplete.
    pub async fn status_names(&self) -> crate::Result<LiveView<Vec<String>>> {
        let query: QueryFn<Vec<String>> =
            Arc::new(|conn: &Connection| RegistryStore::statuses(conn).names());
        live_query(&self.store, &[Table::Status], query, &self.shutdown).await
    }

    /// Categories used by projects of the current partition.
    pub async fn categories_in_use(&self) -> crate::Result<LiveView<Vec<String>>> {
        filter::categories_in_use(self.store.clone(), self.filter.subscribe(), &self.shutdown).await
    }

    /// Statuses used by projects of the current partition.
    pub async fn statuses_in_use(&self) -> crate::Result<LiveView<Vec<String>>> {
        filter::statuses_in_use(self.store.clone(), self.filter.subscribe(), &self.shutdown).await
    }

    // Projects

    pub async fn project(&self, id: ProjectId) -> crate::Result<ProjectRecord> {
        self.store
            .read(move |conn| ProjectStore::new(conn).get(id))
            .await?
            .ok_or(crate::Error::NotFound {
                entity: "project",
                id: id.0,
            })
    }

    /// Add a project to the end of the current partition.
    pub async fn add_project(&self, mut record: ProjectRecord) -> crate::Result<ProjectId> {
        record.is_demo = self.demo_mode();
        coordinator::insert_project(&self.store, record).await
    }

    /// Replace the editable fields of a project; position and partition stay.
    pub async fn update_project(&self, record: ProjectRecord) -> crate::Result<()> {
        coordinator::update_project(&self.store, record).await
    }

    /// Move a project to the end of the demo (`true`) or production partition.
    pub async fn move_project(&self, id: ProjectId, is_demo: bool) -> crate::Result<()> {
        coordinator::move_project(&self.store, id, is_demo).await
    }

    pub async fn delete_project(&self, id: ProjectId) -> crate::Result<bool> {
        let Some(steps) = coordinator::delete_project(&self.store, id).await? else {
            return Ok(false);
        };
        for step in steps {
            self.forget_step_lock(step)?;
        }
        Ok(true)
    }

    /// Persist the given order of the current partition's projects.
    pub async fn reorder_projects(&self, ordered: &[ProjectRecord]) -> crate::Result<()> {
        let ids = ordered.iter().map(|p| p.id).collect();
        coordinator::reorder_projects(&self.store, self.demo_mode(), ids).await
    }

    // Steps

    pub async fn step(&self, id: StepId) -> crate::Result<StepRecord> {
        self.store
            .read(move |conn| StepStore::new(conn).get(id))
            .await?
            .ok_or(crate::Error::NotFound {
                entity: "step",
                id: id.0,
            })
    }

    pub async fn add_step(&self, record: StepRecord) -> crate::Result<StepId> {
        coordinator::insert_step(&self.store, record).await
    }

    /// Replace the editable fields of a step. Its timer, project and position stay.
    pub async fn update_step(&self, record: StepRecord) -> crate::Result<()> {
        let lock = self.step_lock(record.id)?;
        let _guard = lock.lock().await;
        coordinator::update_step(&self.store, record).await
    }

    pub async fn delete_step(&self, id: StepId) -> crate::Result<bool> {
        let lock = self.step_lock(id)?;
        let _guard = lock.lock().await;
        let deleted = coordinator::delete_step(&self.store, id).await?;
        self.forget_step_lock(id)?;
        Ok(deleted)
    }

    /// Persist the given step order of `project_id`.
    pub async fn reorder_steps(&self, project_id: ProjectId, ordered: &[StepRecord]) -> crate::Result<()> {
        let ids = ordered.iter().map(|s| s.id).collect();
        coordinator::reorder_steps(&self.store, project_id, ids).await
    }

    // Tags

    /// Rename a category across the current partition and the registry.
    pub async fn rename_category(&self, old: &str, new: &str) -> crate::Result<()> {
        coordinator::rename_tag(&self.store, TagKind::Category, old, new, self.demo_mode()).await
    }

    /// Rename a status across the current partition and the registry.
    pub async fn rename_status(&self, old: &str, new: &str) -> crate::Result<()> {
        coordinator::rename_tag(&self.store, TagKind::Status, old, new, self.demo_mode()).await
    }

    // Timer

    /// Start a stopped step or pause a running one. Returns the persisted result.
    pub async fn toggle_timer(&self, id: StepId) -> crate::Result<StepRecord> {
        let next = self.write_timer(id, timer::toggled).await?;
        if next.is_running {
            info!(step = %id, "timer started");
        } else {
            info!(step = %id, banked = next.dauer_seconds, "timer paused");
        }
        Ok(next)
    }

    /// Zero a step's banked seconds. A running step keeps running from now.
    pub async fn reset_duration(&self, id: StepId) -> crate::Result<StepRecord> {
        let next = self.write_timer(id, timer::reset).await?;
        info!(step = %id, running = next.is_running, "timer reset");
        Ok(next)
    }

    /// Re-read the step, apply `transition` and compare-and-set the timer fields.
    async fn write_timer(
        &self,
        id: StepId,
        transition: fn(&StepRecord, i64) -> StepRecord,
    ) -> crate::Result<StepRecord> {
        let lock = self.step_lock(id)?;
        let _guard = lock.lock().await;
        let now = self.clock.now_millis();

        self.store
            .write(&[Table::Steps], move |conn| {
                let steps = StepStore::new(conn);
                let current = steps
                    .get(id)?
                    .ok_or_else(|| gtd_local_db::Error::not_found("step", id.0))?;
                let next = transition(&current, now);
                if !steps.compare_and_set_timer(&current, &next)? {
                    return Err(gtd_local_db::Error::Conflict { id: id.0 });
                }
                Ok(next)
            })
            .await
    }

    fn step_lock(&self, id: StepId) -> crate::Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .step_locks
            .lock()
            .map_err(|e| crate::Error::generic(format!("Failed to acquire step lock table: {}", e)))?;
        Ok(locks.entry(id).or_default().clone())
    }

    fn forget_step_lock(&self, id: StepId) -> crate::Result<()> {
        let mut locks = self
            .step_locks
            .lock()
            .map_err(|e| crate::Error::generic(format!("Failed to acquire step lock table: {}", e)))?;
        locks.remove(&id);
        Ok(())
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Store `value` in `slot`, reporting whether it changed.
fn set_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker() -> Tracker {
        Tracker::open_in_memory(&Config::default(), Arc::new(ManualClock::new(1_000))).unwrap()
    }

    #[tokio::test]
    async fn filter_setters_normalize_and_dedupe() {
        let tracker = tracker();
        let mut keys = tracker.filter.subscribe();

        tracker.set_category_filter(Some("  ".into()));
        assert!(!keys.has_changed().unwrap());

        tracker.set_category_filter(Some("Work".into()));
        assert!(keys.has_changed().unwrap());
        assert_eq!(keys.borrow_and_update().category.as_deref(), Some("Work"));

        tracker.set_category_filter(Some("Work".into()));
        assert!(!keys.has_changed().unwrap());
    }

    #[tokio::test]
    async fn projects_are_added_to_the_current_partition() {
        let tracker = tracker();
        tracker.set_demo_mode(true);
        let id = tracker.add_project(ProjectRecord::new("Demo")).await.unwrap();
        assert!(tracker.project(id).await.unwrap().is_demo);
    }

    #[tokio::test]
    async fn toggling_a_missing_step_is_not_found() {
        let tracker = tracker();
        let err = tracker.toggle_timer(StepId(404)).await.unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { entity: "step", id: 404 }));
    }

    #[tokio::test]
    async fn deleting_a_project_drops_its_step_locks() {
        let tracker = tracker();
        let project = tracker.add_project(ProjectRecord::new("Health")).await.unwrap();
        let kept = tracker.add_project(ProjectRecord::new("Learn")).await.unwrap();
        let run = tracker.add_step(StepRecord::new(project, "Run")).await.unwrap();
        let swim = tracker.add_step(StepRecord::new(project, "Swim")).await.unwrap();
        let read = tracker.add_step(StepRecord::new(kept, "Read")).await.unwrap();
        for id in [run, swim, read] {
            tracker.toggle_timer(id).await.unwrap();
        }
        assert_eq!(tracker.step_locks.lock().unwrap().len(), 3);

        assert!(tracker.delete_project(project).await.unwrap());
        let locks = tracker.step_locks.lock().unwrap();
        assert_eq!(locks.keys().copied().collect::<Vec<_>>(), [read]);
    }

    #[tokio::test]
    async fn open_reports_unavailable_store() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the database file should be.
        let path = dir.path().join("gtd.db");
        std::fs::create_dir(&path).unwrap();
        let config = Config {
            database_path: Some(path),
            ..Config::default()
        };
        assert!(matches!(
            Tracker::open(&config),
            Err(crate::Error::StoreUnavailable { .. })
        ));
    }
}
