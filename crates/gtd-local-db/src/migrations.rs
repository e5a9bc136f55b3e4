//! Database migration management.
//!
//! Versions are tracked in `schema_migrations`. Each migration is additive and
//! safe to re-run: tables are created with `IF NOT EXISTS` and columns are only
//! added when missing. Databases written by the legacy mobile app carry their
//! version in `PRAGMA user_version` (8..=14) and are adopted at the matching
//! step of the ladder below.

use crate::schema::{self, APPLICATION_TABLES, SCHEMA_VERSION, TABLE_SCHEMA_MIGRATIONS};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

/// How to react when the stored schema cannot be migrated forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationPolicy {
    /// Drop every application table and recreate an empty schema instead of
    /// failing. All stored data is lost.
    pub allow_destructive_fallback: bool,
}

impl MigrationPolicy {
    pub fn destructive() -> Self {
        Self {
            allow_destructive_fallback: true,
        }
    }
}

/// What [`MigrationManager::migrate`] did to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Schema was already current.
    UpToDate,
    /// Migrations `from + 1 ..= to` were applied in order.
    Migrated { from: u32, to: u32 },
    /// No migration path existed; all tables were dropped and recreated.
    Recreated { from: u32 },
}

struct Migration {
    version: u32,
    description: &'static str,
    apply: fn(&Connection) -> crate::Result<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "base projects and steps tables",
        apply: migration_1,
    },
    Migration {
        version: 2,
        description: "category registry",
        apply: migration_2,
    },
    Migration {
        version: 3,
        description: "steps tracked in seconds with start timestamp",
        apply: migration_3,
    },
    Migration {
        version: 4,
        description: "status registry",
        apply: migration_4,
    },
    Migration {
        version: 5,
        description: "demo partition flag on projects",
        apply: migration_5,
    },
    Migration {
        version: 6,
        description: "exercise metadata on steps",
        apply: migration_6,
    },
    Migration {
        version: 7,
        description: "fitness metadata on steps",
        apply: migration_7,
    },
];

/// Offset between legacy `user_version` numbers and this ladder.
const LEGACY_VERSION_OFFSET: u32 = 7;

/// Database migration manager.
pub struct MigrationManager;

impl MigrationManager {
    /// Apply all pending migrations to the database.
    pub fn migrate(conn: &Connection, policy: MigrationPolicy) -> crate::Result<MigrationOutcome> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        let current_version = match Self::current_version(conn)? {
            Some(version) => version,
            None => Self::adopt_legacy_version(conn)?,
        };

        if current_version > SCHEMA_VERSION {
            if !policy.allow_destructive_fallback {
                return Err(crate::Error::migration(format!(
                    "no migration path from schema version {} to {}",
                    current_version, SCHEMA_VERSION
                )));
            }
            warn!(
                from = current_version,
                to = SCHEMA_VERSION,
                "no migration path; dropping all tables, stored projects and steps are lost"
            );
            Self::recreate(conn)?;
            return Ok(MigrationOutcome::Recreated {
                from: current_version,
            });
        }

        if current_version == SCHEMA_VERSION {
            debug!(version = current_version, "schema up to date");
            return Ok(MigrationOutcome::UpToDate);
        }

        for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
            Self::apply(conn, migration)?;
        }

        Ok(MigrationOutcome::Migrated {
            from: current_version,
            to: SCHEMA_VERSION,
        })
    }

    fn apply(conn: &Connection, migration: &Migration) -> crate::Result<()> {
        let tx = conn.unchecked_transaction()?;
        (migration.apply)(&tx).map_err(|e| {
            crate::Error::migration(format!(
                "migration {} ({}) failed: {}",
                migration.version, migration.description, e
            ))
        })?;
        tx.execute(
            &format!("INSERT OR REPLACE INTO {} (version) VALUES (?)", TABLE_SCHEMA_MIGRATIONS),
            params![migration.version],
        )?;
        tx.commit()?;
        info!(version = migration.version, description = migration.description, "applied migration");
        Ok(())
    }

    /// A database created by the legacy app has tables and a Room
    /// `user_version` but no `schema_migrations` rows.
    fn adopt_legacy_version(conn: &Connection) -> crate::Result<u32> {
        let user_version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if !(LEGACY_VERSION_OFFSET + 1..=LEGACY_VERSION_OFFSET + SCHEMA_VERSION).contains(&user_version)
            || !table_exists(conn, schema::TABLE_PROJECTS)?
        {
            return Ok(0);
        }

        let adopted = user_version - LEGACY_VERSION_OFFSET;
        info!(user_version, adopted, "adopting legacy database");
        for version in 1..=adopted {
            conn.execute(
                &format!("INSERT OR IGNORE INTO {} (version) VALUES (?)", TABLE_SCHEMA_MIGRATIONS),
                params![version],
            )?;
        }
        Ok(adopted)
    }

    fn recreate(conn: &Connection) -> crate::Result<()> {
        let tx = conn.unchecked_transaction()?;
        for table in APPLICATION_TABLES {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;
        }
        tx.execute_batch(&format!("DELETE FROM {}", TABLE_SCHEMA_MIGRATIONS))?;
        tx.commit()?;

        for migration in MIGRATIONS {
            Self::apply(conn, migration)?;
        }
        Ok(())
    }

    /// Get the current schema version.
    pub fn current_version(conn: &Connection) -> crate::Result<Option<u32>> {
        let version = conn.query_row(
            &format!("SELECT MAX(version) FROM {}", TABLE_SCHEMA_MIGRATIONS),
            params![],
            |row| row.get::<_, Option<u32>>(0),
        )?;
        Ok(version)
    }
}

fn table_exists(conn: &Connection, table: &str) -> crate::Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> crate::Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?) WHERE name = ?",
            params![table, column],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, definition: &str) -> crate::Result<()> {
    if column_exists(conn, table, column)? {
        return Ok(());
    }
    conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition))?;
    Ok(())
}

fn migration_1(conn: &Connection) -> crate::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            dauer INTEGER NOT NULL DEFAULT 0,
            kategorie TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT ''
        );

        -- Legacy steps stored target and elapsed time in minutes
        CREATE TABLE IF NOT EXISTS steps (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            ziel_zeit INTEGER NOT NULL DEFAULT 0,
            dauer INTEGER NOT NULL DEFAULT 0,
            is_running INTEGER NOT NULL DEFAULT 0,
            notes TEXT NOT NULL DEFAULT ''
        );
        "#,
    )?;
    Ok(())
}

fn migration_2(conn: &Connection) -> crate::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS index_categories_name ON categories(name);
        "#,
    )?;
    Ok(())
}

fn migration_3(conn: &Connection) -> crate::Result<()> {
    if column_exists(conn, schema::TABLE_STEPS, schema::steps::START_TIME_MILLIS)? {
        debug!("steps already tracked in seconds");
    } else {
        conn.execute_batch(
            r#"
            CREATE TABLE steps_new (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                sort_order INTEGER NOT NULL,
                ziel_zeit_seconds INTEGER NOT NULL DEFAULT 0,
                dauer_seconds INTEGER NOT NULL DEFAULT 0,
                is_running INTEGER NOT NULL DEFAULT 0,
                notes TEXT NOT NULL DEFAULT '',
                start_time_millis INTEGER NOT NULL DEFAULT 0
            );

            -- Running rows keep their flag with no start stamp; pausing them banks nothing
            INSERT INTO steps_new (id, project_id, name, sort_order, ziel_zeit_seconds, dauer_seconds, is_running, notes, start_time_millis)
            SELECT id, project_id, name, sort_order, CAST(ziel_zeit AS INTEGER) * 60, CAST(dauer AS INTEGER) * 60, is_running, notes, 0
            FROM steps;

            DROP TABLE steps;
            ALTER TABLE steps_new RENAME TO steps;
            "#,
        )?;
    }
    conn.execute_batch("CREATE INDEX IF NOT EXISTS index_steps_project_id ON steps(project_id);")?;
    Ok(())
}

fn migration_4(conn: &Connection) -> crate::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS status (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS index_status_name ON status(name);
        "#,
    )?;
    Ok(())
}

fn migration_5(conn: &Connection) -> crate::Result<()> {
    add_column_if_missing(conn, schema::TABLE_PROJECTS, schema::projects::IS_DEMO, "INTEGER NOT NULL DEFAULT 0")?;
    conn.execute_batch("CREATE INDEX IF NOT EXISTS index_projects_is_demo_sort ON projects(is_demo, sort_order);")?;
    Ok(())
}

fn migration_6(conn: &Connection) -> crate::Result<()> {
    use schema::steps::*;
    add_column_if_missing(conn, schema::TABLE_STEPS, EXERCISE_DURATION_MINUTES, "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, schema::TABLE_STEPS, AVERAGE_PULSE, "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, schema::TABLE_STEPS, PEAK_PULSE, "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, schema::TABLE_STEPS, AVERAGE_LOAD, "TEXT NOT NULL DEFAULT ''")?;
    Ok(())
}

fn migration_7(conn: &Connection) -> crate::Result<()> {
    use schema::steps::*;
    add_column_if_missing(conn, schema::TABLE_STEPS, FITNESS_LEVEL, "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, schema::TABLE_STEPS, REPETITIONS, "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, schema::TABLE_STEPS, CALORIES, "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, schema::TABLE_STEPS, DISTANCE_METERS, "INTEGER NOT NULL DEFAULT 0")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?)").unwrap();
        let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0)).unwrap();
        rows.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        let outcome = MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated { from: 0, to: SCHEMA_VERSION });
        assert_eq!(MigrationManager::current_version(&conn).unwrap(), Some(SCHEMA_VERSION));

        let step_columns = columns(&conn, "steps");
        for expected in ["dauer_seconds", "start_time_millis", "average_load", "distance_meters"] {
            assert!(step_columns.iter().any(|c| c == expected), "missing {}", expected);
        }
        assert!(!step_columns.iter().any(|c| c == "ziel_zeit"));
        assert!(columns(&conn, "projects").iter().any(|c| c == "is_demo"));
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap();
        let outcome = MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap();
        assert_eq!(outcome, MigrationOutcome::UpToDate);
    }

    #[test]
    fn minute_based_steps_are_converted_to_seconds() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at DATETIME);")
            .unwrap();
        migration_1(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO schema_migrations (version) VALUES (1);
            INSERT INTO projects (id, name, sort_order) VALUES (1, 'Health', 1);
            INSERT INTO steps (project_id, name, sort_order, ziel_zeit, dauer, is_running)
            VALUES (1, 'Run', 1, 30, 12, 1);
            "#,
        )
        .unwrap();

        let outcome = MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated { from: 1, to: SCHEMA_VERSION });

        let (target, banked, running, start): (i64, i64, bool, i64) = conn
            .query_row(
                "SELECT ziel_zeit_seconds, dauer_seconds, is_running, start_time_millis FROM steps WHERE name = 'Run'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(target, 1800);
        assert_eq!(banked, 720);
        assert!(running);
        assert_eq!(start, 0);
    }

    #[test]
    fn legacy_user_version_is_adopted() {
        let conn = Connection::open_in_memory().unwrap();
        // A legacy database at Room version 12: everything up to the demo flag.
        for migration in &MIGRATIONS[..5] {
            (migration.apply)(&conn).unwrap();
        }
        conn.pragma_update(None, "user_version", 12).unwrap();

        let outcome = MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated { from: 5, to: SCHEMA_VERSION });
        assert!(columns(&conn, "steps").iter().any(|c| c == "calories"));
    }

    #[test]
    fn newer_schema_fails_without_destructive_policy() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap();
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?)", params![SCHEMA_VERSION + 1])
            .unwrap();

        let err = MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap_err();
        assert!(matches!(err, crate::Error::Migration { .. }));
    }

    #[test]
    fn newer_schema_is_recreated_with_destructive_policy() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::migrate(&conn, MigrationPolicy::default()).unwrap();
        conn.execute("INSERT INTO projects (name, sort_order) VALUES ('Health', 1)", [])
            .unwrap();
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?)", params![SCHEMA_VERSION + 3])
            .unwrap();

        let outcome = MigrationManager::migrate(&conn, MigrationPolicy::destructive()).unwrap();
        assert_eq!(outcome, MigrationOutcome::Recreated { from: SCHEMA_VERSION + 3 });
        assert_eq!(MigrationManager::current_version(&conn).unwrap(), Some(SCHEMA_VERSION));

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
