//! Reactive core of the GTD tracker.
//!
//! This crate turns the SQLite records of `gtd-local-db` into live views:
//! filter-driven project lists, step lists whose running timers advance once
//! per heartbeat, and the ordering and rename rules that keep sort positions
//! dense. [`Tracker`] is the composition root collaborators talk to.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod heartbeat;
pub mod live;
pub mod projection;
pub mod store;
pub mod timer;
pub mod tracker;

/// Core result type used throughout the tracker.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all tracker operations.
pub use error::Error;

/// Wall-clock sources.
pub use clock::{Clock, ManualClock, SystemClock};

/// Tracker configuration.
pub use config::Config;

/// Tag renames.
pub use coordinator::TagKind;

/// Filter state.
pub use filter::FilterKey;

/// Shared timer heartbeat.
pub use heartbeat::Heartbeat;

/// Live values.
pub use live::LiveView;

/// Steps with their display duration.
pub use projection::StepView;

/// Async store with change notifications.
pub use store::{Store, Table};

/// The tracker facade.
pub use tracker::Tracker;

/// Storage records re-exported for collaborators.
pub use gtd_local_db::{ProjectId, ProjectRecord, StepId, StepRecord};
