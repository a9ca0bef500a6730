use crate::cmd::fail_with;
use crate::output::{CliError, OutputMode, render};
use anyhow::{Context as _, Result};
use bugtrack_core::config::TRACKER_DIR;
use bugtrack_core::db::{DEFAULT_BUSY_TIMEOUT, STORE_FILE, SqliteStore};
use bugtrack_core::error::ErrorCode;
use clap::Args;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config.toml even if `.bugtrack/` already exists. The store is
    /// kept.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[store]\n\
    lock_timeout_ms = 5000\n\
    busy_timeout_ms = 5000\n\
    \n\
    [bugs]\n\
    default_severity = \"Medium\"\n\
    default_priority = \"Normal\"\n";

const GITIGNORE: &str = "bugtrack.db\nbugtrack.db-*\nwrite.lock\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    tracker_dir: String,
    store: String,
    reinitialized: bool,
}

/// Execute `bt init`. Creates:
///
/// ```text
/// .bugtrack/
///   config.toml   (default project config)
///   .gitignore    (store and lock files)
///   bugtrack.db   (migrated SQLite store)
/// ```
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let tracker_dir = project_root.join(TRACKER_DIR);
    let existed = tracker_dir.exists();
    if existed && !args.force {
        return Err(fail_with(
            output,
            &CliError::coded(
                ErrorCode::AlreadyInitialized,
                format!("{TRACKER_DIR}/ already exists in {}", project_root.display()),
            ),
        ));
    }

    std::fs::create_dir_all(&tracker_dir)
        .with_context(|| format!("Failed to create {}", tracker_dir.display()))?;
    std::fs::write(tracker_dir.join("config.toml"), CONFIG_TOML)
        .context("Failed to write config.toml")?;
    std::fs::write(tracker_dir.join(".gitignore"), GITIGNORE)
        .context("Failed to write .gitignore")?;

    let store_path = tracker_dir.join(STORE_FILE);
    SqliteStore::open(&store_path, DEFAULT_BUSY_TIMEOUT)?;
    tracing::info!(dir = %tracker_dir.display(), "initialized tracker");

    let payload = InitOutput {
        tracker_dir: tracker_dir.display().to_string(),
        store: store_path.display().to_string(),
        reinitialized: existed,
    };
    render(output, &payload, |p, w| {
        writeln!(w, "Initialized bugtrack in {}", p.tracker_dir)
    })
}
