//! Identity commands: `bt register`, `bt login`, `bt whoami`, `bt passwd`.

use crate::cmd::{Globals, Session, fail_with};
use crate::output::{CliError, pretty_kv, pretty_section, render, render_mode};
use bugtrack_core::config::{self, UserConfig};
use bugtrack_core::error::ErrorCode;
use bugtrack_core::membership::MemberProject;
use bugtrack_core::model::User;
use clap::Args;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Email address; must be unique.
    #[arg(long)]
    pub email: String,

    /// Credential secret.
    #[arg(long, env = "BUGTRACK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "BUGTRACK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct PasswdArgs {
    /// New credential secret.
    #[arg(long, env = "BUGTRACK_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
struct WhoamiOutput {
    user: User,
    projects: Vec<MemberProject>,
}

#[derive(Debug, Serialize)]
struct LoginOutput {
    user: User,
    config: String,
}

fn write_user(user: &User, w: &mut dyn std::io::Write) -> std::io::Result<()> {
    writeln!(w, "{}\t{}\t{}", user.id, user.email, user.name)
}

pub fn run_register(args: &RegisterArgs, globals: Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(project_root, globals)?;
    let _lock = session.write_lock()?;

    let user = session
        .tracker()
        .identity()
        .register(&args.name, &args.email, &args.password)
        .map_err(|e| session.fail(&e))?;

    render(session.output(), &user, |u, w| {
        writeln!(w, "Registered user {} <{}> as #{}", u.name, u.email, u.id)
    })
}

/// Check credentials, then remember the user as the default actor.
pub fn run_login(args: &LoginArgs, globals: Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(project_root, globals)?;
    let user = session
        .tracker()
        .identity()
        .authenticate(&args.email, &args.password)
        .map_err(|e| session.fail(&e))?;

    let Some(path) = config::user_config_path() else {
        return Err(fail_with(
            session.output(),
            &CliError::coded(
                ErrorCode::InternalUnexpected,
                "no user config directory on this platform",
            ),
        ));
    };
    let updated = UserConfig {
        user: Some(user.email.clone()),
        ..globals.user_config.clone()
    };
    config::save_user_config(&path, &updated)?;
    tracing::info!(user = %user.id, "logged in");

    let payload = LoginOutput {
        user,
        config: path.display().to_string(),
    };
    render(session.output(), &payload, |p, w| {
        writeln!(w, "Logged in as {} <{}>", p.user.name, p.user.email)
    })
}

pub fn run_whoami(globals: Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(project_root, globals)?;
    let user = session.actor()?;
    let projects = session
        .tracker()
        .members()
        .projects_of(user.id)
        .map_err(|e| session.fail(&e))?;
    let payload = WhoamiOutput { user, projects };

    render_mode(
        session.output(),
        &payload,
        |p, w| write_user(&p.user, w),
        |p, w| {
            pretty_section(w, &format!("{} <{}>", p.user.name, p.user.email))?;
            pretty_kv(w, "id", p.user.id.to_string())?;
            for mp in &p.projects {
                pretty_kv(
                    w,
                    "project",
                    format!("#{} {} ({})", mp.project.id, mp.project.name, mp.my_role),
                )?;
            }
            Ok(())
        },
    )
}

pub fn run_passwd(args: &PasswdArgs, globals: Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(project_root, globals)?;
    let _lock = session.write_lock()?;
    let user = session.actor()?;
    session
        .tracker()
        .identity()
        .change_credential(&user, &args.new_password)
        .map_err(|e| session.fail(&e))?;

    render(session.output(), &serde_json::json!({ "ok": true, "user": user.id }), |_, w| {
        writeln!(w, "Credential changed for {}", user.email)
    })
}
