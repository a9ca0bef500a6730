//! `bt bug` subcommands: reporting, listing, and the assignment lifecycle.

use crate::cmd::{Globals, Session};
use crate::output::{pretty_kv, pretty_section, render, render_mode};
use bugtrack_core::lifecycle::BugReport;
use bugtrack_core::model::{Bug, BugId, BugPatch, Priority, ProjectId, Severity, Status, UserId};
use clap::{Args, Subcommand};
use std::io::{self, Write};
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum BugCommand {
    /// Report a bug in a project you belong to.
    Report(ReportArgs),
    /// List a project's bugs, newest first.
    List(ListArgs),
    /// Show one bug.
    Show(IdArgs),
    /// Claim a bug (elevated members only).
    Assign(IdArgs),
    /// Release a bug you hold back to open.
    Unassign(IdArgs),
    /// Resolve a bug you hold.
    Resolve(ResolveArgs),
    /// Overwrite bug fields (elevated members only).
    Update(UpdateArgs),
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Project id.
    #[arg(long)]
    pub project: ProjectId,

    /// What is wrong.
    pub description: String,

    #[arg(long)]
    pub severity: Option<Severity>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// Commit the defect was observed at.
    #[arg(long = "commit")]
    pub commit_ref: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project id.
    pub project: ProjectId,

    /// Only show bugs in this status.
    #[arg(long)]
    pub status: Option<Status>,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Bug id (`7` or `#7`).
    pub id: BugId,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub id: BugId,

    /// Commit containing the fix.
    #[arg(long = "commit")]
    pub resolution_commit: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: BugId,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub severity: Option<Severity>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// Set status directly, bypassing the assignment lifecycle.
    #[arg(long)]
    pub status: Option<Status>,

    /// Set the assignee to this user id.
    #[arg(long, conflicts_with = "clear_assignee")]
    pub assignee: Option<UserId>,

    #[arg(long)]
    pub clear_assignee: bool,

    #[arg(long = "commit", conflicts_with = "clear_commit")]
    pub commit_ref: Option<String>,

    #[arg(long)]
    pub clear_commit: bool,

    #[arg(long, conflicts_with = "clear_resolution_commit")]
    pub resolution_commit: Option<String>,

    #[arg(long)]
    pub clear_resolution_commit: bool,
}

fn nullable<T: Clone>(value: Option<&T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.cloned().map(Some)
    }
}

impl UpdateArgs {
    fn patch(&self) -> BugPatch {
        BugPatch {
            description: self.description.clone(),
            severity: self.severity,
            priority: self.priority,
            status: self.status,
            assignee_id: nullable(self.assignee.as_ref(), self.clear_assignee),
            commit_ref: nullable(self.commit_ref.as_ref(), self.clear_commit),
            resolution_commit: nullable(
                self.resolution_commit.as_ref(),
                self.clear_resolution_commit,
            ),
        }
    }
}

fn opt<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| "-".to_string(), ToString::to_string)
}

fn bug_row(b: &Bug, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}",
        b.id,
        b.status,
        b.severity,
        b.priority,
        opt(b.assignee_id.as_ref()),
        b.description
    )
}

fn bug_pretty(b: &Bug, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Bug #{}  [{}]", b.id, b.status))?;
    pretty_kv(w, "project", b.project_id.to_string())?;
    pretty_kv(w, "severity", b.severity.as_str())?;
    pretty_kv(w, "priority", b.priority.as_str())?;
    pretty_kv(w, "reporter", b.reporter_id.to_string())?;
    pretty_kv(w, "assignee", opt(b.assignee_id.as_ref()))?;
    pretty_kv(w, "commit", opt(b.commit_ref.as_ref()))?;
    pretty_kv(w, "resolution", opt(b.resolution_commit.as_ref()))?;
    writeln!(w)?;
    writeln!(w, "{}", b.description)
}

pub fn run_bug(command: &BugCommand, globals: Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(project_root, globals)?;
    let bugs = session.tracker().bugs();
    let output = session.output();

    let bug = match command {
        BugCommand::List(args) => {
            let mut listed = bugs.list(args.project).map_err(|e| session.fail(&e))?;
            if let Some(status) = args.status {
                listed.retain(|b| b.status == status);
            }
            return render(output, &listed, |bs, w| {
                bs.iter().try_for_each(|b| bug_row(b, w))
            });
        }
        BugCommand::Show(args) => bugs.get(args.id).map_err(|e| session.fail(&e))?,
        BugCommand::Report(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            let report = BugReport {
                description: args.description.clone(),
                severity: args.severity,
                priority: args.priority,
                commit_ref: args.commit_ref.clone(),
            };
            bugs.report(&actor, args.project, report)
                .map_err(|e| session.fail(&e))?
        }
        BugCommand::Assign(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            bugs.assign(&actor, args.id).map_err(|e| session.fail(&e))?
        }
        BugCommand::Unassign(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            bugs.unassign(&actor, args.id)
                .map_err(|e| session.fail(&e))?
        }
        BugCommand::Resolve(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            bugs.resolve(&actor, args.id, args.resolution_commit.as_deref())
                .map_err(|e| session.fail(&e))?
        }
        BugCommand::Update(args) => {
            let _lock = session.write_lock()?;
            let actor = session.actor()?;
            bugs.update(&actor, args.id, &args.patch())
                .map_err(|e| session.fail(&e))?
        }
    };

    render_mode(output, &bug, bug_row, bug_pretty)
}
