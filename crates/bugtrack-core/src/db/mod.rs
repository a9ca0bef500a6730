//! SQLite persistence for the tracker.
//!
//! [`SqliteStore`] owns one connection. Both the on-disk and in-memory
//! constructors go through the same setup: pragmas first, then
//! [`migrations::migrate`] up to [`schema::LATEST_VERSION`].

pub mod migrations;
pub mod schema;
pub mod store;

pub use store::SqliteStore;

use std::time::Duration;

/// Busy timeout used for store connections unless configured otherwise.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the store database inside the tracker directory.
pub const STORE_FILE: &str = "bugtrack.db";
