//! `bt project` subcommands.

use crate::cmd::{Globals, Session};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render, render_mode};
use bugtrack_core::membership::{Member, MemberProject};
use bugtrack_core::model::{Project, ProjectId, ProjectPatch};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project; you become its first elevated member.
    Create(CreateArgs),
    /// Overwrite project fields (elevated members only).
    Update(UpdateArgs),
    /// Show one project with its members.
    Show(IdArgs),
    /// List all projects.
    List,
    /// Join a project as a reporter.
    Join(IdArgs),
    /// List the members of a project.
    Members(IdArgs),
    /// List the projects you belong to.
    Mine,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,

    /// Repository reference (URL or path).
    #[arg(long = "repo")]
    pub repository: String,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: ProjectId,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long = "repo")]
    pub repository: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    /// Remove the description.
    #[arg(long)]
    pub clear_description: bool,
}

impl UpdateArgs {
    fn patch(&self) -> ProjectPatch {
        let description = if self.clear_description {
            Some(None)
        } else {
            self.description.clone().map(Some)
        };
        ProjectPatch {
            name: self.name.clone(),
            repository: self.repository.clone(),
            description,
        }
    }
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Project id (`3` or `#3`).
    pub id: ProjectId,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    #[serde(flatten)]
    project: Project,
    members: Vec<Member>,
}

fn project_row(p: &Project, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}", p.id, p.name, p.repository)
}

fn project_pretty(p: &Project, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("#{} {}", p.id, p.name))?;
    pretty_kv(w, "repository", &p.repository)?;
    if let Some(description) = &p.description {
        pretty_kv(w, "description", description)?;
    }
    Ok(())
}

fn member_row(m: &Member, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}\t{}", m.user.id, m.role, m.user.email, m.user.name)
}

pub fn run_project(
    command: &ProjectCommand,
    globals: Globals<'_>,
    project_root: &Path,
) -> anyhow::Result<()> {
    let session = Session::open(project_root, globals)?;
    let tracker = session.tracker();
    let output = session.output();

    match command {
        ProjectCommand::Create(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            let project = tracker
                .projects()
                .create(
                    &actor,
                    &args.name,
                    &args.repository,
                    args.description.as_deref(),
                )
                .map_err(|e| session.fail(&e))?;
            render(output, &project, |p, w| {
                writeln!(w, "Created project #{} {}", p.id, p.name)
            })
        }
        ProjectCommand::Update(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            let project = tracker
                .projects()
                .update(&actor, args.id, &args.patch())
                .map_err(|e| session.fail(&e))?;
            render_mode(output, &project, project_row, project_pretty)
        }
        ProjectCommand::Show(args) => {
            let project = tracker.projects().get(args.id).map_err(|e| session.fail(&e))?;
            let members = tracker
                .members()
                .members_of(args.id)
                .map_err(|e| session.fail(&e))?;
            let payload = ShowOutput { project, members };
            render_mode(
                output,
                &payload,
                |p, w| {
                    project_row(&p.project, w)?;
                    p.members.iter().try_for_each(|m| member_row(m, w))
                },
                |p, w| {
                    project_pretty(&p.project, w)?;
                    pretty_rule(w)?;
                    p.members.iter().try_for_each(|m| member_row(m, w))
                },
            )
        }
        ProjectCommand::List => {
            let projects = tracker.projects().list().map_err(|e| session.fail(&e))?;
            render(output, &projects, |ps, w| {
                ps.iter().try_for_each(|p| project_row(p, w))
            })
        }
        ProjectCommand::Join(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            let membership = tracker
                .members()
                .join(&actor, args.id)
                .map_err(|e| session.fail(&e))?;
            render(output, &membership, |m, w| {
                writeln!(w, "Joined project #{} as {}", m.project_id, m.role)
            })
        }
        ProjectCommand::Members(args) => {
            let members = tracker
                .members()
                .members_of(args.id)
                .map_err(|e| session.fail(&e))?;
            render(output, &members, |ms, w| {
                ms.iter().try_for_each(|m| member_row(m, w))
            })
        }
        ProjectCommand::Mine => {
            let actor = session.actor()?;
            let projects: Vec<MemberProject> = tracker
                .members()
                .projects_of(actor.id)
                .map_err(|e| session.fail(&e))?;
            render(output, &projects, |ps, w| {
                ps.iter().try_for_each(|mp| {
                    writeln!(
                        w,
                        "{}\t{}\t{}",
                        mp.project.id, mp.my_role, mp.project.name
                    )
                })
            })
        }
    }
}
