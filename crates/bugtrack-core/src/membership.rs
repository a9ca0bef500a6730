//! Membership registry: who holds which role in which project.
//!
//! A (user, project) pair has at most one membership. Roles are never
//! changed in place and there is no leave operation, so a recorded
//! membership is permanent.

use crate::error::{Entity, Result, TrackerError};
use crate::model::{Membership, Project, ProjectId, Role, User, UserId, now_us};
use crate::policy::{self, Capability};
use crate::store::Store;
use serde::Serialize;

/// A project member with their identity resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub user: User,
    pub role: Role,
    pub joined_at_us: i64,
}

/// A project as seen by one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberProject {
    #[serde(flatten)]
    pub project: Project,
    pub my_role: Role,
    pub capabilities: Vec<Capability>,
}

pub struct MembershipRegistry<'s> {
    store: &'s dyn Store,
}

impl<'s> MembershipRegistry<'s> {
    pub const fn new(store: &'s dyn Store) -> Self {
        Self { store }
    }

    /// Join `project` as a reporter.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist
    /// - `AlreadyMember` if `user` already holds any role there
    pub fn join(&self, user: &User, project: ProjectId) -> Result<Membership> {
        if self.store.find_project(project)?.is_none() {
            return Err(TrackerError::not_found(Entity::Project, project));
        }

        let membership = Membership {
            user_id: user.id,
            project_id: project,
            role: Role::Reporter,
            created_at_us: now_us(),
        };
        if !self.store.insert_membership(&membership)? {
            tracing::warn!(user = %user.id, %project, "rejected join: already a member");
            return Err(TrackerError::AlreadyMember {
                user: user.id,
                project,
            });
        }

        tracing::info!(user = %user.id, %project, role = %membership.role, "joined project");
        Ok(membership)
    }

    pub fn has_role(&self, user: UserId, project: ProjectId, role: Role) -> Result<bool> {
        Ok(self.role_of(user, project)? == Some(role))
    }

    /// The role `user` holds in `project`, or `None` for non-members.
    pub fn role_of(&self, user: UserId, project: ProjectId) -> Result<Option<Role>> {
        Ok(self
            .store
            .find_membership(user, project)?
            .map(|m| m.role))
    }

    /// Members of `project` in join order.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project does not exist.
    pub fn members_of(&self, project: ProjectId) -> Result<Vec<Member>> {
        if self.store.find_project(project)?.is_none() {
            return Err(TrackerError::not_found(Entity::Project, project));
        }

        self.store
            .memberships_of_project(project)?
            .into_iter()
            .map(|m| {
                let user = self
                    .store
                    .find_user(m.user_id)?
                    .ok_or_else(|| TrackerError::not_found(Entity::User, m.user_id))?;
                Ok(Member {
                    user,
                    role: m.role,
                    joined_at_us: m.created_at_us,
                })
            })
            .collect()
    }

    /// Projects `user` belongs to, with their role and capability set.
    pub fn projects_of(&self, user: UserId) -> Result<Vec<MemberProject>> {
        let mut out = Vec::new();
        for m in self.store.memberships_of_user(user)? {
            let Some(project) = self.store.find_project(m.project_id)? else {
                continue;
            };
            out.push(MemberProject {
                project,
                my_role: m.role,
                capabilities: policy::capabilities(Some(m.role)),
            });
        }
        Ok(out)
    }
}
