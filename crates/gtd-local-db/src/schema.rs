//! Database schema definitions and constants.

// Current schema version
pub const SCHEMA_VERSION: u32 = 7;

// Table names
pub const TABLE_SCHEMA_MIGRATIONS: &str = "schema_migrations";
pub const TABLE_PROJECTS: &str = "projects";
pub const TABLE_STEPS: &str = "steps";
pub const TABLE_CATEGORIES: &str = "categories";
pub const TABLE_STATUS: &str = "status";

/// Tables owned by the application, children before parents.
pub const APPLICATION_TABLES: [&str; 4] = [TABLE_STEPS, TABLE_PROJECTS, TABLE_CATEGORIES, TABLE_STATUS];

// Column names for projects table
pub mod projects {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const SORT_ORDER: &str = "sort_order";
    pub const DAUER: &str = "dauer";
    pub const KATEGORIE: &str = "kategorie";
    pub const STATUS: &str = "status";
    pub const NOTES: &str = "notes";
    pub const IS_DEMO: &str = "is_demo";
}

// Column names for steps table
pub mod steps {
    pub const ID: &str = "id";
    pub const PROJECT_ID: &str = "project_id";
    pub const NAME: &str = "name";
    pub const SORT_ORDER: &str = "sort_order";
    pub const ZIEL_ZEIT_SECONDS: &str = "ziel_zeit_seconds";
    pub const DAUER_SECONDS: &str = "dauer_seconds";
    pub const IS_RUNNING: &str = "is_running";
    pub const NOTES: &str = "notes";
    pub const START_TIME_MILLIS: &str = "start_time_millis";
    pub const EXERCISE_DURATION_MINUTES: &str = "exercise_duration_minutes";
    pub const AVERAGE_PULSE: &str = "average_pulse";
    pub const PEAK_PULSE: &str = "peak_pulse";
    pub const AVERAGE_LOAD: &str = "average_load";
    pub const FITNESS_LEVEL: &str = "fitness_level";
    pub const REPETITIONS: &str = "repetitions";
    pub const CALORIES: &str = "calories";
    pub const DISTANCE_METERS: &str = "distance_meters";
}

// Column names shared by the categories and status registries
pub mod registry {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
}
