//! Database models and persistence operations.

use crate::schema::{TABLE_CATEGORIES, TABLE_STATUS};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub i64);

/// Unique identifier for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database model for projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    /// Dense 1..N position within the `is_demo` partition.
    pub sort_order: i64,
    /// Legacy aggregate duration. Stored and returned, never recomputed.
    pub dauer: i64,
    pub kategorie: String,
    pub status: String,
    pub notes: String,
    pub is_demo: bool,
}

impl ProjectRecord {
    /// A new, not yet persisted project. Identity and position are assigned on insert.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            id: ProjectId(0),
            name: name.into(),
            sort_order: 0,
            dauer: 0,
            kategorie: String::new(),
            status: String::new(),
            notes: String::new(),
            is_demo: false,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: ProjectId(row.get(0)?),
            name: row.get(1)?,
            sort_order: row.get(2)?,
            dauer: row.get(3)?,
            kategorie: row.get(4)?,
            status: row.get(5)?,
            notes: row.get(6)?,
            is_demo: row.get(7)?,
        })
    }
}

const PROJECT_COLUMNS: &str = "id, name, sort_order, dauer, kategorie, status, notes, is_demo";

/// Database model for steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: StepId,
    pub project_id: ProjectId,
    pub name: String,
    /// Dense 1..N position within the owning project.
    pub sort_order: i64,
    pub ziel_zeit_seconds: i64,
    /// Banked seconds, excluding any interval currently running.
    pub dauer_seconds: i64,
    pub is_running: bool,
    /// Wall-clock millis of the last start; 0 while stopped.
    pub start_time_millis: i64,
    pub notes: String,
    pub average_pulse: i64,
    pub peak_pulse: i64,
    pub average_load: String,
    pub fitness_level: i64,
    pub repetitions: i64,
    pub calories: i64,
    pub distance_meters: i64,
}

impl StepRecord {
    /// A new, stopped step for `project_id`. Identity and position are assigned on insert.
    pub fn new<S: Into<String>>(project_id: ProjectId, name: S) -> Self {
        Self {
            id: StepId(0),
            project_id,
            name: name.into(),
            sort_order: 0,
            ziel_zeit_seconds: 0,
            dauer_seconds: 0,
            is_running: false,
            start_time_millis: 0,
            notes: String::new(),
            average_pulse: 0,
            peak_pulse: 0,
            average_load: String::new(),
            fitness_level: 0,
            repetitions: 0,
            calories: 0,
            distance_meters: 0,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: StepId(row.get(0)?),
            project_id: ProjectId(row.get(1)?),
            name: row.get(2)?,
            sort_order: row.get(3)?,
            ziel_zeit_seconds: row.get(4)?,
            dauer_seconds: row.get(5)?,
            is_running: row.get(6)?,
            start_time_millis: row.get(7)?,
            notes: row.get(8)?,
            average_pulse: row.get(9)?,
            peak_pulse: row.get(10)?,
            average_load: row.get(11)?,
            fitness_level: row.get(12)?,
            repetitions: row.get(13)?,
            calories: row.get(14)?,
            distance_meters: row.get(15)?,
        })
    }
}

const STEP_COLUMNS: &str = "id, project_id, name, sort_order, ziel_zeit_seconds, dauer_seconds, is_running, \
     start_time_millis, notes, average_pulse, peak_pulse, average_load, fitness_level, repetitions, calories, \
     distance_meters";

/// Which of the four filtered project queries a filter maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryVariant {
    All,
    ByCategory,
    ByStatus,
    ByCategoryAndStatus,
}

/// Partition and tag constraints for project reads.
///
/// Tag matching is exact string equality; `None` means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectFilter {
    pub is_demo: bool,
    pub category: Option<String>,
    pub status: Option<String>,
}

impl ProjectFilter {
    /// Unfiltered view of one partition.
    pub fn partition(is_demo: bool) -> Self {
        Self {
            is_demo,
            ..Self::default()
        }
    }

    pub fn variant(&self) -> QueryVariant {
        match (&self.category, &self.status) {
            (Some(_), Some(_)) => QueryVariant::ByCategoryAndStatus,
            (Some(_), None) => QueryVariant::ByCategory,
            (None, Some(_)) => QueryVariant::ByStatus,
            (None, None) => QueryVariant::All,
        }
    }
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> crate::Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Database operations for projects.
pub struct ProjectStore<'a> {
    conn: &'a Connection,
}

impl<'a> ProjectStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a project as given, including its sort order and partition.
    pub fn insert(&self, record: &ProjectRecord) -> crate::Result<ProjectId> {
        self.conn.execute(
            r#"
            INSERT INTO projects (name, sort_order, dauer, kategorie, status, notes, is_demo)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.name,
                record.sort_order,
                record.dauer,
                record.kategorie,
                record.status,
                record.notes,
                record.is_demo
            ],
        )?;
        Ok(ProjectId(self.conn.last_insert_rowid()))
    }

    pub fn get(&self, id: ProjectId) -> crate::Result<Option<ProjectRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS),
                params![id.0],
                ProjectRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Projects matching `filter`, ordered by sort order.
    pub fn list(&self, filter: &ProjectFilter) -> crate::Result<Vec<ProjectRecord>> {
        let base = format!("SELECT {} FROM projects WHERE is_demo = ?1", PROJECT_COLUMNS);
        let category = filter.category.as_deref().unwrap_or_default();
        let status = filter.status.as_deref().unwrap_or_default();

        let sql = match filter.variant() {
            QueryVariant::All => format!("{} ORDER BY sort_order ASC", base),
            QueryVariant::ByCategory => format!("{} AND kategorie = ?2 ORDER BY sort_order ASC", base),
            QueryVariant::ByStatus => format!("{} AND status = ?3 ORDER BY sort_order ASC", base),
            QueryVariant::ByCategoryAndStatus => {
                format!("{} AND kategorie = ?2 AND status = ?3 ORDER BY sort_order ASC", base)
            }
        };

        let mut stmt = self.conn.prepare(&sql)?;
        // Unused positional parameters are bound but ignored by the variant's SQL.
        let rows = match filter.variant() {
            QueryVariant::All => stmt.query_map(params![filter.is_demo], ProjectRecord::from_row)?,
            QueryVariant::ByCategory => {
                stmt.query_map(params![filter.is_demo, category], ProjectRecord::from_row)?
            }
            QueryVariant::ByStatus | QueryVariant::ByCategoryAndStatus => {
                stmt.query_map(params![filter.is_demo, category, status], ProjectRecord::from_row)?
            }
        };
        collect(rows)
    }

    /// Replace the editable fields of a project. Position and partition are
    /// left as stored; see [`ProjectStore::set_position`] and
    /// [`ProjectStore::move_to_partition`].
    ///
    /// Fails with `NotFound` when the id vanished.
    pub fn update(&self, record: &ProjectRecord) -> crate::Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE projects
            SET name = ?, dauer = ?, kategorie = ?, status = ?, notes = ?
            WHERE id = ?
            "#,
            params![
                record.name,
                record.dauer,
                record.kategorie,
                record.status,
                record.notes,
                record.id.0
            ],
        )?;
        if changed == 0 {
            return Err(crate::Error::not_found("project", record.id.0));
        }
        Ok(())
    }

    pub fn set_position(&self, id: ProjectId, sort_order: i64) -> crate::Result<()> {
        let changed = self.conn.execute(
            "UPDATE projects SET sort_order = ? WHERE id = ?",
            params![sort_order, id.0],
        )?;
        if changed == 0 {
            return Err(crate::Error::not_found("project", id.0));
        }
        Ok(())
    }

    /// Move a project into the `is_demo` partition at `sort_order`.
    ///
    /// The caller renumbers the partition it left.
    pub fn move_to_partition(&self, id: ProjectId, is_demo: bool, sort_order: i64) -> crate::Result<()> {
        let changed = self.conn.execute(
            "UPDATE projects SET is_demo = ?, sort_order = ? WHERE id = ?",
            params![is_demo, sort_order, id.0],
        )?;
        if changed == 0 {
            return Err(crate::Error::not_found("project", id.0));
        }
        Ok(())
    }

    /// Delete a project and, through the foreign key, all of its steps.
    ///
    /// Returns whether a row was removed; deleting an absent id is not an error.
    pub fn delete(&self, id: ProjectId) -> crate::Result<bool> {
        let changed = self.conn.execute("DELETE FROM projects WHERE id = ?", params![id.0])?;
        Ok(changed > 0)
    }

    pub fn count_in_partition(&self, is_demo: bool) -> crate::Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE is_demo = ?",
            params![is_demo],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Distinct non-blank categories used by projects of the partition.
    pub fn categories_in_partition(&self, is_demo: bool) -> crate::Result<Vec<String>> {
        self.distinct_tags("kategorie", is_demo)
    }

    /// Distinct non-blank statuses used by projects of the partition.
    pub fn statuses_in_partition(&self, is_demo: bool) -> crate::Result<Vec<String>> {
        self.distinct_tags("status", is_demo)
    }

    fn distinct_tags(&self, column: &str, is_demo: bool) -> crate::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {col} FROM projects WHERE is_demo = ? AND TRIM({col}) != '' ORDER BY {col} ASC",
            col = column
        ))?;
        let rows = stmt.query_map(params![is_demo], |row| row.get::<_, String>(0))?;
        collect(rows)
    }

    /// Retag every project of the partition whose category equals `old_name`.
    pub fn rename_category(&self, old_name: &str, new_name: &str, is_demo: bool) -> crate::Result<usize> {
        let changed = self.conn.execute(
            "UPDATE projects SET kategorie = ? WHERE kategorie = ? AND is_demo = ?",
            params![new_name, old_name, is_demo],
        )?;
        Ok(changed)
    }

    /// Retag every project of the partition whose status equals `old_name`.
    pub fn rename_status(&self, old_name: &str, new_name: &str, is_demo: bool) -> crate::Result<usize> {
        let changed = self.conn.execute(
            "UPDATE projects SET status = ? WHERE status = ? AND is_demo = ?",
            params![new_name, old_name, is_demo],
        )?;
        Ok(changed)
    }
}

/// Database operations for steps.
pub struct StepStore<'a> {
    conn: &'a Connection,
}

impl<'a> StepStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a step as given. Fails if the owning project does not exist.
    pub fn insert(&self, record: &StepRecord) -> crate::Result<StepId> {
        self.conn.execute(
            r#"
            INSERT INTO steps (project_id, name, sort_order, ziel_zeit_seconds, dauer_seconds, is_running,
                               start_time_millis, notes, average_pulse, peak_pulse, average_load,
                               fitness_level, repetitions, calories, distance_meters)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.project_id.0,
                record.name,
                record.sort_order,
                record.ziel_zeit_seconds,
                record.dauer_seconds,
                record.is_running,
                record.start_time_millis,
                record.notes,
                record.average_pulse,
                record.peak_pulse,
                record.average_load,
                record.fitness_level,
                record.repetitions,
                record.calories,
                record.distance_meters
            ],
        )?;
        Ok(StepId(self.conn.last_insert_rowid()))
    }

    pub fn get(&self, id: StepId) -> crate::Result<Option<StepRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM steps WHERE id = ?", STEP_COLUMNS),
                params![id.0],
                StepRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Steps of a project, ordered by sort order.
    pub fn list_for_project(&self, project_id: ProjectId) -> crate::Result<Vec<StepRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM steps WHERE project_id = ? ORDER BY sort_order ASC",
            STEP_COLUMNS
        ))?;
        let rows = stmt.query_map(params![project_id.0], StepRecord::from_row)?;
        collect(rows)
    }

    pub fn count_for_project(&self, project_id: ProjectId) -> crate::Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM steps WHERE project_id = ?",
            params![project_id.0],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Replace the editable fields of a step.
    ///
    /// The owning project, the position and the timer columns stay as stored:
    /// positions change through [`StepStore::set_position`] and the timer only
    /// through [`StepStore::compare_and_set_timer`]. Fails with `NotFound` when
    /// the id vanished.
    pub fn update(&self, record: &StepRecord) -> crate::Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE steps
            SET name = ?, ziel_zeit_seconds = ?, notes = ?, average_pulse = ?, peak_pulse = ?,
                average_load = ?, fitness_level = ?, repetitions = ?, calories = ?, distance_meters = ?
            WHERE id = ?
            "#,
            params![
                record.name,
                record.ziel_zeit_seconds,
                record.notes,
                record.average_pulse,
                record.peak_pulse,
                record.average_load,
                record.fitness_level,
                record.repetitions,
                record.calories,
                record.distance_meters,
                record.id.0
            ],
        )?;
        if changed == 0 {
            return Err(crate::Error::not_found("step", record.id.0));
        }
        Ok(())
    }

    pub fn set_position(&self, id: StepId, sort_order: i64) -> crate::Result<()> {
        let changed = self.conn.execute(
            "UPDATE steps SET sort_order = ? WHERE id = ?",
            params![sort_order, id.0],
        )?;
        if changed == 0 {
            return Err(crate::Error::not_found("step", id.0));
        }
        Ok(())
    }

    /// Persist the timer fields of `next` only if the stored timer still matches `current`.
    ///
    /// Returns `false` when another writer changed `(is_running, start_time_millis)` in between.
    pub fn compare_and_set_timer(&self, current: &StepRecord, next: &StepRecord) -> crate::Result<bool> {
        let changed = self.conn.execute(
            r#"
            UPDATE steps
            SET dauer_seconds = ?, is_running = ?, start_time_millis = ?
            WHERE id = ? AND is_running = ? AND start_time_millis = ?
            "#,
            params![
                next.dauer_seconds,
                next.is_running,
                next.start_time_millis,
                current.id.0,
                current.is_running,
                current.start_time_millis
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a step. Returns whether a row was removed.
    pub fn delete(&self, id: StepId) -> crate::Result<bool> {
        let changed = self.conn.execute("DELETE FROM steps WHERE id = ?", params![id.0])?;
        Ok(changed > 0)
    }
}

/// Distinct-name registry backing category or status autocomplete.
pub struct RegistryStore<'a> {
    conn: &'a Connection,
    table: &'static str,
}

impl<'a> RegistryStore<'a> {
    pub fn categories(conn: &'a Connection) -> Self {
        Self {
            conn,
            table: TABLE_CATEGORIES,
        }
    }

    pub fn statuses(conn: &'a Connection) -> Self {
        Self {
            conn,
            table: TABLE_STATUS,
        }
    }

    /// Register `name`. Blank names and names already present are ignored.
    ///
    /// Returns whether a new row was written.
    pub fn insert(&self, name: &str) -> crate::Result<bool> {
        if name.trim().is_empty() {
            return Ok(false);
        }
        let changed = self.conn.execute(
            &format!("INSERT OR IGNORE INTO {} (name) VALUES (?)", self.table),
            params![name],
        )?;
        Ok(changed > 0)
    }

    /// All registered names in ascending order.
    pub fn names(&self) -> crate::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT name FROM {} ORDER BY name ASC", self.table))?;
        let rows = stmt.query_map(params![], |row| row.get::<_, String>(0))?;
        collect(rows)
    }

    pub fn delete_by_name(&self, name: &str) -> crate::Result<bool> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE name = ?", self.table), params![name])?;
        Ok(changed > 0)
    }
}
