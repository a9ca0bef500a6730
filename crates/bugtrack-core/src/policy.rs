//! Authorization policy.
//!
//! Every permission decision in the tracker reduces to two predicates over
//! membership data, [`is_member`] and [`is_elevated`], plus assignee
//! identity ([`is_assignee`]). Nothing else (time, history, severity)
//! influences a decision.

use crate::error::{Result, TrackerError};
use crate::membership::MembershipRegistry;
use crate::model::{Bug, ProjectId, Role, UserId};
use serde::Serialize;

/// Something a project member may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReportBug,
    ManageBugs,
    EditProject,
}

impl Capability {
    pub const ALL: [Self; 3] = [Self::ReportBug, Self::ManageBugs, Self::EditProject];
}

/// Whether a holder of `role` (or a non-member, for `None`) has `capability`.
#[must_use]
pub const fn grants(role: Option<Role>, capability: Capability) -> bool {
    match (role, capability) {
        (Some(Role::Elevated), _) => true,
        (Some(Role::Reporter), Capability::ReportBug) => true,
        (Some(Role::Reporter), _) | (None, _) => false,
    }
}

/// Full capability set for a role, in declaration order.
#[must_use]
pub fn capabilities(role: Option<Role>) -> Vec<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|cap| grants(role, *cap))
        .collect()
}

/// `user` holds the elevated role in `project`.
pub fn is_elevated(
    registry: &MembershipRegistry<'_>,
    user: UserId,
    project: ProjectId,
) -> Result<bool> {
    registry.has_role(user, project, Role::Elevated)
}

/// `user` holds any role in `project`.
pub fn is_member(
    registry: &MembershipRegistry<'_>,
    user: UserId,
    project: ProjectId,
) -> Result<bool> {
    Ok(registry.role_of(user, project)?.is_some())
}

/// `actor` is the bug's current assignee. An unassigned bug has no
/// assignee any actor could equal.
#[must_use]
pub fn is_assignee(actor: UserId, bug: &Bug) -> bool {
    bug.assignee_id == Some(actor)
}

pub(crate) fn require_member(
    registry: &MembershipRegistry<'_>,
    actor: UserId,
    project: ProjectId,
    action: &str,
) -> Result<()> {
    if is_member(registry, actor, project)? {
        return Ok(());
    }
    tracing::warn!(%actor, %project, action, "rejected: not a project member");
    Err(TrackerError::Forbidden(format!(
        "only members of project {project} may {action}"
    )))
}

pub(crate) fn require_elevated(
    registry: &MembershipRegistry<'_>,
    actor: UserId,
    project: ProjectId,
    action: &str,
) -> Result<()> {
    if is_elevated(registry, actor, project)? {
        return Ok(());
    }
    tracing::warn!(%actor, %project, action, "rejected: elevated role required");
    Err(TrackerError::Forbidden(format!(
        "only elevated members of project {project} may {action}"
    )))
}

pub(crate) fn require_assignee(actor: UserId, bug: &Bug, action: &str) -> Result<()> {
    if is_assignee(actor, bug) {
        return Ok(());
    }
    tracing::warn!(%actor, bug = %bug.id, assignee = ?bug.assignee_id, action, "rejected: not the assignee");
    Err(TrackerError::Forbidden(format!(
        "only the assignee of bug {} may {action}",
        bug.id
    )))
}
