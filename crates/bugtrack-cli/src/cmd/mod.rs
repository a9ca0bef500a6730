pub mod bug;
pub mod completions;
pub mod init;
pub mod project;
pub mod user;

use crate::actor;
use crate::output::{CliError, OutputMode, render_error};
use bugtrack_core::Tracker;
use bugtrack_core::config::{self, ProjectConfig, UserConfig};
use bugtrack_core::db::{STORE_FILE, SqliteStore};
use bugtrack_core::error::{ErrorCode, TrackerError};
use bugtrack_core::lock::WriteLock;
use bugtrack_core::model::User;
use std::path::{Path, PathBuf};

/// Global flags every handler needs.
#[derive(Debug, Clone, Copy)]
pub struct Globals<'a> {
    pub output: OutputMode,
    pub user_flag: Option<&'a str>,
    pub user_config: &'a UserConfig,
}

/// An opened tracker directory: config, store, and output settings.
pub struct Session<'a> {
    pub tracker_dir: PathBuf,
    pub config: ProjectConfig,
    pub store: SqliteStore,
    pub globals: Globals<'a>,
}

impl<'a> Session<'a> {
    /// Locate `.bugtrack/` above `project_root` and open its store.
    pub fn open(project_root: &Path, globals: Globals<'a>) -> anyhow::Result<Self> {
        let Some(tracker_dir) = config::find_tracker_dir(project_root) else {
            return Err(fail_with(
                globals.output,
                &CliError::coded(
                    ErrorCode::NotInitialized,
                    "not a bugtrack directory: .bugtrack not found",
                ),
            ));
        };

        let config = match config::load_project_config(&tracker_dir) {
            Ok(config) => config,
            Err(err) => {
                return Err(fail_with(
                    globals.output,
                    &CliError::coded(ErrorCode::ConfigParseError, format!("{err:#}")),
                ));
            }
        };

        let store = SqliteStore::open(
            &tracker_dir.join(STORE_FILE),
            config.store.busy_timeout(),
        )?;
        tracing::debug!(dir = %tracker_dir.display(), "opened tracker store");

        Ok(Self {
            tracker_dir,
            config,
            store,
            globals,
        })
    }

    pub const fn output(&self) -> OutputMode {
        self.globals.output
    }

    pub fn tracker(&self) -> Tracker<'_> {
        Tracker::new(&self.store).with_bug_defaults(self.config.bugs.defaults())
    }

    /// Resolve the acting user, rendering `Unauthenticated` on failure.
    pub fn actor(&self) -> anyhow::Result<User> {
        actor::require_actor(
            &self.tracker().identity(),
            self.globals.user_flag,
            self.globals.user_config,
        )
        .map_err(|err| fail_with(self.output(), &err))
    }

    /// Hold the tracker-wide write lock for the rest of the command.
    pub fn write_lock(&self) -> anyhow::Result<WriteLock> {
        WriteLock::acquire_in(&self.tracker_dir, self.config.store.lock_timeout())
            .map_err(|err| fail_with(self.output(), &CliError::from(&err)))
    }

    /// Render a domain failure and turn it into the command's error.
    pub fn fail(&self, err: &TrackerError) -> anyhow::Error {
        fail_with(self.output(), &CliError::from(err))
    }
}

/// Marker for failures already rendered to stderr.
#[derive(Debug)]
pub struct Reported(pub String);

impl std::fmt::Display for Reported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Reported {}

/// Render `err` to stderr and return it as an `anyhow` error for exit.
pub fn fail_with(output: OutputMode, err: &CliError) -> anyhow::Error {
    if let Err(render_err) = render_error(output, err) {
        tracing::warn!("failed to render error: {render_err}");
    }
    anyhow::Error::new(Reported(err.message.clone()))
}
