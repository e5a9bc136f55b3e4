//! Ordering and rename rules.
//!
//! Sort orders are dense `1..=N`: per `is_demo` partition for projects and per
//! project for steps. Inserts append, deletes close the gap, and a reorder
//! must name every record of its partition exactly once.

use crate::store::{Store, Table};
use gtd_local_db::{
    Connection, ProjectFilter, ProjectId, ProjectRecord, ProjectStore, RegistryStore, StepId, StepRecord, StepStore,
};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

/// Which free-text tag a rename applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Category,
    Status,
}

impl TagKind {
    fn table(self) -> Table {
        match self {
            TagKind::Category => Table::Categories,
            TagKind::Status => Table::Status,
        }
    }

    fn registry(self, conn: &Connection) -> RegistryStore<'_> {
        match self {
            TagKind::Category => RegistryStore::categories(conn),
            TagKind::Status => RegistryStore::statuses(conn),
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Category => write!(f, "category"),
            TagKind::Status => write!(f, "status"),
        }
    }
}

fn require_name(kind: &str, name: &str) -> crate::Result<()> {
    if name.trim().is_empty() {
        return Err(crate::Error::validation(format!("{} name must not be blank", kind)));
    }
    Ok(())
}

fn validate_step(record: &StepRecord) -> crate::Result<()> {
    require_name("step", &record.name)?;
    if record.ziel_zeit_seconds < 0 {
        return Err(crate::Error::validation("step target time must not be negative"));
    }
    Ok(())
}

/// Check that `ordered` names each of `stored` exactly once.
fn check_full_sequence<I: Copy + Eq + std::hash::Hash + fmt::Debug>(
    what: &str,
    ordered: &[I],
    stored: &[I],
) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(ordered.len());
    for id in ordered {
        if !seen.insert(*id) {
            return Err(format!("{} {:?} listed twice", what, id));
        }
    }
    let stored: HashSet<I> = stored.iter().copied().collect();
    if seen != stored {
        return Err(format!(
            "{} reorder must list every record of the partition exactly once",
            what
        ));
    }
    Ok(())
}

fn register_tags(conn: &Connection, record: &ProjectRecord) -> gtd_local_db::Result<()> {
    RegistryStore::categories(conn).insert(&record.kategorie)?;
    RegistryStore::statuses(conn).insert(&record.status)?;
    Ok(())
}

/// Renumber a project partition to `1..=N`, keeping the current order.
fn renumber_projects(conn: &Connection, is_demo: bool) -> gtd_local_db::Result<()> {
    let store = ProjectStore::new(conn);
    for (index, record) in store.list(&ProjectFilter::partition(is_demo))?.into_iter().enumerate() {
        let position = index as i64 + 1;
        if record.sort_order != position {
            store.set_position(record.id, position)?;
        }
    }
    Ok(())
}

fn renumber_steps(conn: &Connection, project_id: ProjectId) -> gtd_local_db::Result<()> {
    let store = StepStore::new(conn);
    for (index, record) in store.list_for_project(project_id)?.into_iter().enumerate() {
        let position = index as i64 + 1;
        if record.sort_order != position {
            store.set_position(record.id, position)?;
        }
    }
    Ok(())
}

/// Insert a project at the end of its partition and register its tags.
pub async fn insert_project(store: &Store, record: ProjectRecord) -> crate::Result<ProjectId> {
    require_name("project", &record.name)?;
    let id = store
        .write(&[Table::Projects, Table::Categories, Table::Status], move |conn| {
            let projects = ProjectStore::new(conn);
            let mut record = record;
            record.sort_order = projects.count_in_partition(record.is_demo)? + 1;
            let id = projects.insert(&record)?;
            register_tags(conn, &record)?;
            Ok(id)
        })
        .await?;
    debug!(%id, "project inserted");
    Ok(id)
}

/// Replace a project's editable fields and register its tags.
///
/// `sort_order` and `is_demo` of `record` are ignored; positions change through
/// [`reorder_projects`] and partitions through [`move_project`].
pub async fn update_project(store: &Store, record: ProjectRecord) -> crate::Result<()> {
    require_name("project", &record.name)?;
    store
        .write(&[Table::Projects, Table::Categories, Table::Status], move |conn| {
            ProjectStore::new(conn).update(&record)?;
            register_tags(conn, &record)
        })
        .await
}

/// Move a project to the end of the other partition and close the gap it left.
///
/// Moving a project into the partition it already belongs to changes nothing.
pub async fn move_project(store: &Store, id: ProjectId, is_demo: bool) -> crate::Result<()> {
    let moved = store
        .write(&[Table::Projects], move |conn| {
            let projects = ProjectStore::new(conn);
            let existing = projects
                .get(id)?
                .ok_or_else(|| gtd_local_db::Error::not_found("project", id.0))?;
            if existing.is_demo == is_demo {
                return Ok(false);
            }
            let position = projects.count_in_partition(is_demo)? + 1;
            projects.move_to_partition(id, is_demo, position)?;
            renumber_projects(conn, existing.is_demo)?;
            Ok(true)
        })
        .await?;
    if moved {
        info!(%id, is_demo, "project moved");
    }
    Ok(())
}

/// Delete a project with its steps and close the gap in its partition.
///
/// Returns the ids of the steps removed with it, or `None` when the project
/// no longer existed.
pub async fn delete_project(store: &Store, id: ProjectId) -> crate::Result<Option<Vec<StepId>>> {
    store
        .write(&[Table::Projects, Table::Steps], move |conn| {
            let projects = ProjectStore::new(conn);
            let Some(existing) = projects.get(id)? else {
                return Ok(None);
            };
            let steps: Vec<StepId> = StepStore::new(conn)
                .list_for_project(id)?
                .into_iter()
                .map(|s| s.id)
                .collect();
            projects.delete(id)?;
            renumber_projects(conn, existing.is_demo)?;
            Ok(Some(steps))
        })
        .await
}

/// Persist `ordered` as the new order of its partition. Only `sort_order` is written.
pub async fn reorder_projects(
    store: &Store,
    is_demo: bool,
    ordered: Vec<ProjectId>,
) -> crate::Result<()> {
    let count = ordered.len();
    store
        .write(&[Table::Projects], move |conn| {
            let projects = ProjectStore::new(conn);
            let stored: Vec<ProjectId> = projects
                .list(&ProjectFilter::partition(is_demo))?
                .into_iter()
                .map(|p| p.id)
                .collect();
            if let Err(message) = check_full_sequence("project", &ordered, &stored) {
                return Ok(Err(message));
            }

            for (index, id) in ordered.iter().enumerate() {
                projects.set_position(*id, index as i64 + 1)?;
            }
            Ok(Ok(()))
        })
        .await?
        .map_err(crate::Error::validation)?;
    info!(is_demo, count, "projects reordered");
    Ok(())
}

/// Insert a step at the end of its project.
pub async fn insert_step(store: &Store, record: StepRecord) -> crate::Result<StepId> {
    validate_step(&record)?;
    let id = store
        .write(&[Table::Steps], move |conn| {
            let project_id = record.project_id;
            if ProjectStore::new(conn).get(project_id)?.is_none() {
                return Err(gtd_local_db::Error::not_found("project", project_id.0));
            }
            let steps = StepStore::new(conn);
            let mut record = record;
            record.sort_order = steps.count_for_project(project_id)? + 1;
            steps.insert(&record)
        })
        .await?;
    debug!(%id, "step inserted");
    Ok(id)
}

/// Replace a step's editable fields.
///
/// The owning project, the position and the timer columns of `record` are
/// ignored, so an edit built from an older snapshot cannot undo a toggle.
pub async fn update_step(store: &Store, record: StepRecord) -> crate::Result<()> {
    validate_step(&record)?;
    store
        .write(&[Table::Steps], move |conn| StepStore::new(conn).update(&record))
        .await
}

/// Delete a step and close the gap in its project. Absent ids are a no-op.
pub async fn delete_step(store: &Store, id: StepId) -> crate::Result<bool> {
    store
        .write(&[Table::Steps], move |conn| {
            let steps = StepStore::new(conn);
            let Some(existing) = steps.get(id)? else {
                return Ok(false);
            };
            steps.delete(id)?;
            renumber_steps(conn, existing.project_id)?;
            Ok(true)
        })
        .await
}

/// Persist `ordered` as the new step order of `project_id`.
pub async fn reorder_steps(
    store: &Store,
    project_id: ProjectId,
    ordered: Vec<StepId>,
) -> crate::Result<()> {
    let count = ordered.len();
    store
        .write(&[Table::Steps], move |conn| {
            let steps = StepStore::new(conn);
            let stored: Vec<StepId> = steps
                .list_for_project(project_id)?
                .into_iter()
                .map(|s| s.id)
                .collect();
            if let Err(message) = check_full_sequence("step", &ordered, &stored) {
                return Ok(Err(message));
            }

            for (index, id) in ordered.iter().enumerate() {
                steps.set_position(*id, index as i64 + 1)?;
            }
            Ok(Ok(()))
        })
        .await?
        .map_err(crate::Error::validation)?;
    info!(%project_id, count, "steps reordered");
    Ok(())
}

/// Rename a tag across the projects of one partition and its registry.
///
/// Runs as three ordered writes: retag the projects, drop `old` from the
/// registry, register `new` if it is not blank. A failure part way leaves the
/// earlier writes in place.
pub async fn rename_tag(
    store: &Store,
    kind: TagKind,
    old: &str,
    new: &str,
    is_demo: bool,
) -> crate::Result<()> {
    if old.trim().is_empty() {
        return Err(crate::Error::validation(format!("{} to rename must not be blank", kind)));
    }
    if old == new {
        return Err(crate::Error::validation(format!("{} is already named {:?}", kind, new)));
    }

    let (old, new) = (old.to_string(), new.to_string());
    let retagged = {
        let (old, new) = (old.clone(), new.clone());
        store
            .write(&[Table::Projects], move |conn| {
                let projects = ProjectStore::new(conn);
                match kind {
                    TagKind::Category => projects.rename_category(&old, &new, is_demo),
                    TagKind::Status => projects.rename_status(&old, &new, is_demo),
                }
            })
            .await?
    };

    {
        let old = old.clone();
        store
            .write(&[kind.table()], move |conn| kind.registry(conn).delete_by_name(&old))
            .await?;
    }

    if !new.trim().is_empty() {
        let new = new.clone();
        store
            .write(&[kind.table()], move |conn| kind.registry(conn).insert(&new))
            .await?;
    }

    info!(%kind, %old, %new, is_demo, retagged, "tag renamed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtd_local_db::Database;

    fn store() -> Store {
        Store::new(Database::open_in_memory().unwrap())
    }

    async fn projects(store: &Store, is_demo: bool) -> Vec<ProjectRecord> {
        store
            .read(move |conn| ProjectStore::new(conn).list(&ProjectFilter::partition(is_demo)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn inserts_append_per_partition() {
        let store = store();
        insert_project(&store, ProjectRecord::new("Health")).await.unwrap();
        insert_project(&store, ProjectRecord::new("Learn")).await.unwrap();
        insert_project(
            &store,
            ProjectRecord {
                is_demo: true,
                ..ProjectRecord::new("Demo")
            },
        )
        .await
        .unwrap();

        let live: Vec<_> = projects(&store, false).await.into_iter().map(|p| (p.name, p.sort_order)).collect();
        assert_eq!(live, [("Health".to_string(), 1), ("Learn".to_string(), 2)]);
        assert_eq!(projects(&store, true).await[0].sort_order, 1);
    }

    #[tokio::test]
    async fn blank_names_are_rejected_before_the_store() {
        let store = store();
        let err = insert_project(&store, ProjectRecord::new("  ")).await.unwrap_err();
        assert!(matches!(err, crate::Error::Validation { .. }));
        assert!(projects(&store, false).await.is_empty());
    }

    #[tokio::test]
    async fn reorder_assigns_positions_and_keeps_ids() {
        let store = store();
        let health = insert_project(&store, ProjectRecord::new("Health")).await.unwrap();
        let learn = insert_project(&store, ProjectRecord::new("Learn")).await.unwrap();
        let write = insert_project(&store, ProjectRecord::new("Write")).await.unwrap();

        reorder_projects(&store, false, vec![write, health, learn]).await.unwrap();

        let ordered: Vec<_> = projects(&store, false).await.into_iter().map(|p| (p.id, p.sort_order)).collect();
        assert_eq!(ordered, [(write, 1), (health, 2), (learn, 3)]);
    }

    #[tokio::test]
    async fn partial_or_duplicate_reorder_is_rejected() {
        let store = store();
        let health = insert_project(&store, ProjectRecord::new("Health")).await.unwrap();
        let learn = insert_project(&store, ProjectRecord::new("Learn")).await.unwrap();

        let err = reorder_projects(&store, false, vec![learn]).await.unwrap_err();
        assert!(matches!(err, crate::Error::Validation { .. }));
        let err = reorder_projects(&store, false, vec![learn, learn]).await.unwrap_err();
        assert!(matches!(err, crate::Error::Validation { .. }));

        let ordered: Vec<_> = projects(&store, false).await.into_iter().map(|p| p.id).collect();
        assert_eq!(ordered, [health, learn]);
    }

    #[tokio::test]
    async fn stale_snapshot_update_keeps_positions_dense() {
        let store = store();
        let health = insert_project(&store, ProjectRecord::new("Health")).await.unwrap();
        let learn = insert_project(&store, ProjectRecord::new("Learn")).await.unwrap();
        let snapshot = projects(&store, false).await.remove(0);
        assert_eq!((snapshot.id, snapshot.sort_order), (health, 1));

        reorder_projects(&store, false, vec![learn, health]).await.unwrap();
        update_project(
            &store,
            ProjectRecord {
                notes: "annual checkup".into(),
                ..snapshot
            },
        )
        .await
        .unwrap();

        let ordered: Vec<_> = projects(&store, false)
            .await
            .into_iter()
            .map(|p| (p.id, p.sort_order, p.notes))
            .collect();
        assert_eq!(
            ordered,
            [(learn, 1, String::new()), (health, 2, "annual checkup".to_string())]
        );
    }

    #[tokio::test]
    async fn partition_changes_only_through_move() {
        let store = store();
        let a = insert_project(&store, ProjectRecord::new("A")).await.unwrap();
        let b = insert_project(&store, ProjectRecord::new("B")).await.unwrap();
        let d = insert_project(
            &store,
            ProjectRecord {
                is_demo: true,
                ..ProjectRecord::new("D")
            },
        )
        .await
        .unwrap();

        let mut flipped = projects(&store, false).await.remove(0);
        flipped.is_demo = true;
        update_project(&store, flipped).await.unwrap();
        let production: Vec<_> = projects(&store, false).await.into_iter().map(|p| p.id).collect();
        assert_eq!(production, [a, b]);

        move_project(&store, a, true).await.unwrap();
        let production: Vec<_> = projects(&store, false).await.into_iter().map(|p| (p.id, p.sort_order)).collect();
        let demo: Vec<_> = projects(&store, true).await.into_iter().map(|p| (p.id, p.sort_order)).collect();
        assert_eq!(production, [(b, 1)]);
        assert_eq!(demo, [(d, 1), (a, 2)]);

        move_project(&store, a, true).await.unwrap();
        assert_eq!(projects(&store, true).await.len(), 2);
        let err = move_project(&store, ProjectId(99), false).await.unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { entity: "project", id: 99 }));
    }

    #[tokio::test]
    async fn delete_project_reports_cascaded_steps() {
        let store = store();
        let health = insert_project(&store, ProjectRecord::new("Health")).await.unwrap();
        let learn = insert_project(&store, ProjectRecord::new("Learn")).await.unwrap();
        let run = insert_step(&store, StepRecord::new(health, "Run")).await.unwrap();
        let swim = insert_step(&store, StepRecord::new(health, "Swim")).await.unwrap();

        assert_eq!(delete_project(&store, health).await.unwrap(), Some(vec![run, swim]));
        assert_eq!(delete_project(&store, health).await.unwrap(), None);
        let remaining: Vec<_> = projects(&store, false).await.into_iter().map(|p| (p.id, p.sort_order)).collect();
        assert_eq!(remaining, [(learn, 1)]);
    }

    #[tokio::test]
    async fn delete_closes_the_gap() {
        let store = store();
        let project = insert_project(&store, ProjectRecord::new("Health")).await.unwrap();
        let mut ids = Vec::new();
        for name in ["Warm up", "Run", "Stretch"] {
            ids.push(insert_step(&store, StepRecord::new(project, name)).await.unwrap());
        }

        assert!(delete_step(&store, ids[0]).await.unwrap());
        assert!(!delete_step(&store, ids[0]).await.unwrap());

        let steps = store
            .read(move |conn| StepStore::new(conn).list_for_project(project))
            .await
            .unwrap();
        let positions: Vec<_> = steps.iter().map(|s| (s.name.as_str(), s.sort_order)).collect();
        assert_eq!(positions, [("Run", 1), ("Stretch", 2)]);
    }

    #[tokio::test]
    async fn step_for_missing_project_is_not_found() {
        let store = store();
        let err = insert_step(&store, StepRecord::new(ProjectId(99), "Run")).await.unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { entity: "project", id: 99 }));
    }

    #[tokio::test]
    async fn rename_retags_partition_and_registry() {
        let store = store();
        let work = ProjectRecord {
            kategorie: "Work".into(),
            ..ProjectRecord::new("Taxes")
        };
        insert_project(&store, work.clone()).await.unwrap();
        insert_project(
            &store,
            ProjectRecord {
                is_demo: true,
                ..work
            },
        )
        .await
        .unwrap();

        rename_tag(&store, TagKind::Category, "Work", "Job", false).await.unwrap();

        assert_eq!(projects(&store, false).await[0].kategorie, "Job");
        assert_eq!(projects(&store, true).await[0].kategorie, "Work");
        let names = store
            .read(|conn| RegistryStore::categories(conn).names())
            .await
            .unwrap();
        assert_eq!(names, ["Job"]);
    }

    #[tokio::test]
    async fn rename_to_blank_untags_without_registering() {
        let store = store();
        insert_project(
            &store,
            ProjectRecord {
                status: "Open".into(),
                ..ProjectRecord::new("Taxes")
            },
        )
        .await
        .unwrap();

        rename_tag(&store, TagKind::Status, "Open", "", false).await.unwrap();

        assert_eq!(projects(&store, false).await[0].status, "");
        let names = store.read(|conn| RegistryStore::statuses(conn).names()).await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn invalid_renames_are_rejected() {
        let store = store();
        for (old, new) in [("", "Job"), ("Work", "Work")] {
            let err = rename_tag(&store, TagKind::Category, old, new, false).await.unwrap_err();
            assert!(matches!(err, crate::Error::Validation { .. }));
        }
    }
}
