//! Acting-user resolution for CLI commands.
//!
//! The resolution chain: `--user` flag > `BUGTRACK_USER` env > `user` in the
//! user config (written by `bt login`). The handle is a user id or email and
//! must name a registered user. Read-only commands work without an actor.

use crate::output::CliError;
use bugtrack_core::config::UserConfig;
use bugtrack_core::error::ErrorCode;
use bugtrack_core::identity::IdentityStore;
use bugtrack_core::model::User;
use std::env;

/// Environment reader for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

fn resolve_handle_with(
    cli_flag: Option<&str>,
    config: &UserConfig,
    env: &dyn EnvReader,
) -> Option<String> {
    let env_user = env.get("BUGTRACK_USER");
    [cli_flag, env_user.as_deref(), config.user.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|handle| !handle.is_empty())
        .map(ToString::to_string)
}

/// The acting-user handle, if any step of the chain supplies one.
pub fn resolve_handle(cli_flag: Option<&str>, config: &UserConfig) -> Option<String> {
    resolve_handle_with(cli_flag, config, &RealEnv)
}

/// Resolve the acting user, failing with `unauthenticated` if no handle is
/// given or it names no registered user.
pub fn require_actor(
    identity: &IdentityStore<'_>,
    cli_flag: Option<&str>,
    config: &UserConfig,
) -> Result<User, CliError> {
    let Some(handle) = resolve_handle(cli_flag, config) else {
        return Err(CliError::coded(
            ErrorCode::Unauthenticated,
            "an acting user is required for this command",
        ));
    };
    let user = identity.resolve_handle(&handle).map_err(|e| CliError::from(&e))?;
    tracing::debug!(user = %user.id, "resolved acting user");
    Ok(user)
}
