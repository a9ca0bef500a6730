use super::{CasOutcome, Store, Transition};
use crate::error::{Result, TrackerError};
use crate::model::{
    Bug, BugId, BugPatch, Credential, Membership, NewBug, NewProject, NewUser, Project, ProjectId,
    ProjectPatch, Role, User, UserId, now_us,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    projects: BTreeMap<ProjectId, Project>,
    memberships: HashMap<(UserId, ProjectId), Membership>,
    bugs: BTreeMap<BugId, Bug>,
    next_user: i64,
    next_project: i64,
    next_bug: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-process store. One mutex guards all tables, so every capability call
/// is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| TrackerError::Storage("memory store mutex poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn create_user(&self, new: NewUser) -> Result<Option<User>> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let id = UserId(next_id(&mut t.next_user));
        let user = User {
            id,
            name: new.name,
            email: new.email,
            credential: new.credential,
            created_at_us: now_us(),
        };
        t.users.insert(id, user.clone());
        Ok(Some(user))
    }

    fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn update_credential(&self, id: UserId, credential: &Credential) -> Result<bool> {
        let mut t = self.lock()?;
        Ok(t.users.get_mut(&id).is_some_and(|user| {
            user.credential = credential.clone();
            true
        }))
    }

    fn create_project(&self, new: NewProject, creator: UserId) -> Result<(Project, Membership)> {
        let mut t = self.lock()?;
        let id = ProjectId(next_id(&mut t.next_project));
        let ts = now_us();
        let project = Project {
            id,
            name: new.name,
            repository: new.repository,
            description: new.description,
            created_at_us: ts,
            updated_at_us: ts,
        };
        let membership = Membership {
            user_id: creator,
            project_id: id,
            role: Role::Elevated,
            created_at_us: ts,
        };
        t.projects.insert(id, project.clone());
        t.memberships.insert((creator, id), membership.clone());
        Ok((project, membership))
    }

    fn find_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.lock()?.projects.get(&id).cloned())
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.lock()?.projects.values().cloned().collect())
    }

    fn patch_project(&self, id: ProjectId, patch: &ProjectPatch) -> Result<Option<Project>> {
        let mut t = self.lock()?;
        Ok(t.projects.get_mut(&id).map(|project| {
            patch.apply_to(project);
            project.updated_at_us = now_us();
            project.clone()
        }))
    }

    fn find_membership(&self, user: UserId, project: ProjectId) -> Result<Option<Membership>> {
        Ok(self.lock()?.memberships.get(&(user, project)).cloned())
    }

    fn insert_membership(&self, membership: &Membership) -> Result<bool> {
        let mut t = self.lock()?;
        let key = (membership.user_id, membership.project_id);
        if t.memberships.contains_key(&key) {
            return Ok(false);
        }
        t.memberships.insert(key, membership.clone());
        Ok(true)
    }

    fn memberships_of_project(&self, project: ProjectId) -> Result<Vec<Membership>> {
        let t = self.lock()?;
        let mut rows: Vec<Membership> = t
            .memberships
            .values()
            .filter(|m| m.project_id == project)
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.created_at_us, m.user_id));
        Ok(rows)
    }

    fn memberships_of_user(&self, user: UserId) -> Result<Vec<Membership>> {
        let t = self.lock()?;
        let mut rows: Vec<Membership> = t
            .memberships
            .values()
            .filter(|m| m.user_id == user)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.project_id);
        Ok(rows)
    }

    fn create_bug(&self, new: NewBug) -> Result<Bug> {
        let mut t = self.lock()?;
        let id = BugId(next_id(&mut t.next_bug));
        let ts = now_us();
        let bug = Bug {
            id,
            project_id: new.project_id,
            description: new.description,
            severity: new.severity,
            priority: new.priority,
            status: crate::model::Status::Open,
            reporter_id: new.reporter_id,
            assignee_id: None,
            commit_ref: new.commit_ref,
            resolution_commit: None,
            created_at_us: ts,
            updated_at_us: ts,
        };
        t.bugs.insert(id, bug.clone());
        Ok(bug)
    }

    fn find_bug(&self, id: BugId) -> Result<Option<Bug>> {
        Ok(self.lock()?.bugs.get(&id).cloned())
    }

    fn bugs_of_project(&self, project: ProjectId) -> Result<Vec<Bug>> {
        let t = self.lock()?;
        // BTreeMap iterates ascending by id, which is creation order.
        Ok(t.bugs
            .values()
            .rev()
            .filter(|b| b.project_id == project)
            .cloned()
            .collect())
    }

    fn patch_bug(&self, id: BugId, patch: &BugPatch) -> Result<Option<Bug>> {
        let mut t = self.lock()?;
        Ok(t.bugs.get_mut(&id).map(|bug| {
            patch.apply_to(bug);
            bug.updated_at_us = now_us();
            bug.clone()
        }))
    }

    fn transition_bug(&self, id: BugId, transition: &Transition) -> Result<CasOutcome> {
        let mut t = self.lock()?;
        let Some(bug) = t.bugs.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };
        if bug.assignee_id != transition.expected_assignee {
            return Ok(CasOutcome::Stale {
                current: bug.assignee_id,
            });
        }
        bug.assignee_id = transition.assignee;
        bug.status = transition.status;
        if let Some(commit) = &transition.resolution_commit {
            bug.resolution_commit.clone_from(commit);
        }
        bug.updated_at_us = now_us();
        Ok(CasOutcome::Applied(bug.clone()))
    }
}
