//! Forward-only upgrades keyed on `PRAGMA user_version`.

use super::schema::{self, SchemaStep};
use anyhow::{Context as _, Result, bail};
use rusqlite::Connection;

/// Version recorded in the database; `0` for a fresh file.
///
/// # Errors
///
/// Fails if the pragma cannot be read or holds a negative value.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw).with_context(|| format!("invalid store schema version {raw}"))
}

/// Bring `conn` up to [`schema::LATEST_VERSION`] and return the version it
/// ends at. Each pending step and its version bump commit together.
///
/// # Errors
///
/// Fails if a step fails, or if the store was written by a newer build.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    let found = schema_version(conn)?;
    if found > schema::LATEST_VERSION {
        bail!(
            "store schema v{found} is newer than this build supports (v{}); upgrade bt",
            schema::LATEST_VERSION
        );
    }

    let pending: Vec<&SchemaStep> = schema::STEPS.iter().filter(|s| s.version > found).collect();
    for step in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)
            .with_context(|| format!("schema step v{} ({})", step.version, step.name))?;
        tx.pragma_update(None, "user_version", step.version)?;
        tx.commit()?;
        tracing::debug!(version = step.version, step = step.name, "upgraded store schema");
    }

    schema_version(conn)
}
