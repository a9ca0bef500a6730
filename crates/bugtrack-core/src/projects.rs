//! Project creation and administration.

use crate::error::{Entity, Result, TrackerError};
use crate::membership::MembershipRegistry;
use crate::model::{NewProject, Project, ProjectId, ProjectPatch, User};
use crate::policy;
use crate::store::Store;

pub struct ProjectService<'s> {
    store: &'s dyn Store,
}

fn non_blank(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Trimmed text, or `None` when absent or blank.
fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(ToString::to_string)
}

impl<'s> ProjectService<'s> {
    pub const fn new(store: &'s dyn Store) -> Self {
        Self { store }
    }

    /// Create a project; `actor` becomes its first, elevated member.
    pub fn create(
        &self,
        actor: &User,
        name: &str,
        repository: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        let new = NewProject {
            name: non_blank("name", name)?,
            repository: non_blank("repository", repository)?,
            description: optional_text(description),
        };
        let (project, _) = self.store.create_project(new, actor.id)?;
        tracing::info!(project = %project.id, creator = %actor.id, "created project");
        Ok(project)
    }

    pub fn get(&self, id: ProjectId) -> Result<Project> {
        self.store
            .find_project(id)?
            .ok_or_else(|| TrackerError::not_found(Entity::Project, id))
    }

    pub fn list(&self) -> Result<Vec<Project>> {
        self.store.list_projects()
    }

    /// Overwrite the provided project fields.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist
    /// - `Forbidden` unless `actor` is elevated in it
    /// - `InvalidInput` if the patch blanks a required field
    pub fn update(&self, actor: &User, id: ProjectId, patch: &ProjectPatch) -> Result<Project> {
        self.get(id)?;
        let registry = MembershipRegistry::new(self.store);
        policy::require_elevated(&registry, actor.id, id, "modify the project")?;

        let patch = ProjectPatch {
            name: patch.name.as_deref().map(|n| non_blank("name", n)).transpose()?,
            repository: patch
                .repository
                .as_deref()
                .map(|r| non_blank("repository", r))
                .transpose()?,
            description: patch
                .description
                .as_ref()
                .map(|d| optional_text(d.as_deref())),
        };

        let project = self
            .store
            .patch_project(id, &patch)?
            .ok_or_else(|| TrackerError::not_found(Entity::Project, id))?;
        tracing::info!(project = %id, actor = %actor.id, "updated project");
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::ProjectService;
    use crate::error::TrackerError;
    use crate::identity::IdentityStore;
    use crate::membership::MembershipRegistry;
    use crate::model::{ProjectId, ProjectPatch, Role};
    use crate::store::MemoryStore;

    #[test]
    fn creator_becomes_elevated() {
        let store = MemoryStore::new();
        let a = IdentityStore::new(&store)
            .register("A", "a@x.io", "pw")
            .unwrap();
        let project = ProjectService::new(&store)
            .create(&a, "Tracker", "git@x.io:t.git", Some("  "))
            .unwrap();

        assert_eq!(project.description, None);
        assert_eq!(
            MembershipRegistry::new(&store)
                .role_of(a.id, project.id)
                .unwrap(),
            Some(Role::Elevated)
        );
    }

    #[test]
    fn create_requires_name_and_repository() {
        let store = MemoryStore::new();
        let a = IdentityStore::new(&store)
            .register("A", "a@x.io", "pw")
            .unwrap();
        let projects = ProjectService::new(&store);
        assert!(matches!(
            projects.create(&a, "", "repo", None),
            Err(TrackerError::InvalidInput { field: "name", .. })
        ));
        assert!(matches!(
            projects.create(&a, "name", " ", None),
            Err(TrackerError::InvalidInput {
                field: "repository",
                ..
            })
        ));
    }

    #[test]
    fn only_elevated_members_update() {
        let store = MemoryStore::new();
        let ids = IdentityStore::new(&store);
        let a = ids.register("A", "a@x.io", "pw").unwrap();
        let b = ids.register("B", "b@x.io", "pw").unwrap();
        let projects = ProjectService::new(&store);
        let p = projects.create(&a, "Tracker", "repo", None).unwrap();
        MembershipRegistry::new(&store).join(&b, p.id).unwrap();

        let patch = ProjectPatch {
            description: Some(Some("now with docs".to_string())),
            ..ProjectPatch::default()
        };
        assert!(matches!(
            projects.update(&b, p.id, &patch),
            Err(TrackerError::Forbidden(_))
        ));

        let updated = projects.update(&a, p.id, &patch).unwrap();
        assert_eq!(updated.description.as_deref(), Some("now with docs"));
        assert_eq!(updated.name, "Tracker");
    }

    #[test]
    fn update_stores_trimmed_values() {
        let store = MemoryStore::new();
        let a = IdentityStore::new(&store)
            .register("A", "a@x.io", "pw")
            .unwrap();
        let projects = ProjectService::new(&store);
        let p = projects.create(&a, " Tracker ", " repo ", None).unwrap();
        assert_eq!((p.name.as_str(), p.repository.as_str()), ("Tracker", "repo"));

        let updated = projects
            .update(
                &a,
                p.id,
                &ProjectPatch {
                    name: Some("  Renamed\t".to_string()),
                    repository: Some(" git@x.io:r.git ".to_string()),
                    description: Some(Some("   ".to_string())),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.repository, "git@x.io:r.git");
        assert_eq!(updated.description, None);
        assert_eq!(projects.get(p.id).unwrap(), updated);

        assert!(matches!(
            projects.update(
                &a,
                p.id,
                &ProjectPatch {
                    name: Some(" ".to_string()),
                    ..ProjectPatch::default()
                },
            ),
            Err(TrackerError::InvalidInput { field: "name", .. })
        ));
    }

    #[test]
    fn update_missing_project_is_not_found() {
        let store = MemoryStore::new();
        let a = IdentityStore::new(&store)
            .register("A", "a@x.io", "pw")
            .unwrap();
        assert!(matches!(
            ProjectService::new(&store).update(&a, ProjectId(5), &ProjectPatch::default()),
            Err(TrackerError::NotFound { .. })
        ));
    }
}
