//! Storage capability set consumed by the tracker services.
//!
//! The services never touch SQL or files; they hold a `&dyn Store` and call
//! the find/create/patch capabilities below. Two backends ship with the
//! crate:
//!
//! - [`MemoryStore`]: mutex-guarded maps, used by tests and embedders
//! - [`crate::db::SqliteStore`]: the on-disk store used by the CLI
//!
//! Every method is a single atomic unit against the backend. The
//! [`Store::transition_bug`] compare-and-set is what makes concurrent
//! assignment exclusive; [`Store::patch_bug`] and [`Store::patch_project`]
//! touch only the fields their patch names, so an administrative edit never
//! writes back a stale copy of the others.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::model::{
    Bug, BugId, BugPatch, Credential, Membership, NewBug, NewProject, NewUser, Project, ProjectId,
    ProjectPatch, Status, User, UserId,
};

/// Guarded lifecycle write applied by [`Store::transition_bug`].
///
/// The write only lands if the stored assignee still equals
/// `expected_assignee` at the moment of writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub expected_assignee: Option<UserId>,
    pub assignee: Option<UserId>,
    pub status: Status,
    /// `None` leaves the resolution commit untouched; `Some(None)` clears it.
    pub resolution_commit: Option<Option<String>>,
}

/// Result of a compare-and-set against the stored assignee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed; carries the updated snapshot.
    Applied(Bug),
    /// The stored assignee no longer matched the expectation.
    Stale { current: Option<UserId> },
    /// No bug with that id.
    Missing,
}

pub trait Store: Send + Sync {
    /// Insert a user. Returns `None` if the email is already registered.
    fn create_user(&self, new: NewUser) -> Result<Option<User>>;
    fn find_user(&self, id: UserId) -> Result<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Returns `false` if the user does not exist.
    fn update_credential(&self, id: UserId, credential: &Credential) -> Result<bool>;

    /// Insert a project and its creator's elevated membership as one unit.
    fn create_project(&self, new: NewProject, creator: UserId) -> Result<(Project, Membership)>;
    fn find_project(&self, id: ProjectId) -> Result<Option<Project>>;
    fn list_projects(&self) -> Result<Vec<Project>>;
    /// Apply the provided fields of `patch` in one atomic write and return
    /// the updated project, or `None` if it does not exist.
    fn patch_project(&self, id: ProjectId, patch: &ProjectPatch) -> Result<Option<Project>>;

    fn find_membership(&self, user: UserId, project: ProjectId) -> Result<Option<Membership>>;
    /// Insert a membership unless one already exists for the pair.
    /// Returns `false` when the pair was already present.
    fn insert_membership(&self, membership: &Membership) -> Result<bool>;
    fn memberships_of_project(&self, project: ProjectId) -> Result<Vec<Membership>>;
    fn memberships_of_user(&self, user: UserId) -> Result<Vec<Membership>>;

    fn create_bug(&self, new: NewBug) -> Result<Bug>;
    fn find_bug(&self, id: BugId) -> Result<Option<Bug>>;
    /// Bugs of a project, newest first.
    fn bugs_of_project(&self, project: ProjectId) -> Result<Vec<Bug>>;
    /// Apply the provided fields of `patch` in one atomic write and return
    /// the updated bug, or `None` if it does not exist. Fields the patch
    /// leaves out keep whatever is stored at the moment of writing.
    fn patch_bug(&self, id: BugId, patch: &BugPatch) -> Result<Option<Bug>>;
    /// Atomically apply `transition` if the stored assignee matches.
    fn transition_bug(&self, id: BugId, transition: &Transition) -> Result<CasOutcome>;
}
