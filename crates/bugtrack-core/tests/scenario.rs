//! End-to-end lifecycle walk-through on every store backend.

use bugtrack_core::Tracker;
use bugtrack_core::db::SqliteStore;
use bugtrack_core::error::TrackerError;
use bugtrack_core::lifecycle::BugReport;
use bugtrack_core::model::{BugPatch, Priority, Role, Severity, Status};
use bugtrack_core::store::{MemoryStore, Store};
use tempfile::TempDir;

fn run_scenario(store: &dyn Store) {
    let tracker = Tracker::new(store);

    // A creates a project and becomes elevated; B joins as a reporter.
    let a = tracker.identity().register("A", "a@example.com", "a-secret").unwrap();
    let b = tracker.identity().register("B", "b@example.com", "b-secret").unwrap();
    let project = tracker
        .projects()
        .create(&a, "Tracker", "git@example.com:tracker.git", Some("bugs"))
        .unwrap();
    let joined = tracker.members().join(&b, project.id).unwrap();
    assert_eq!(joined.role, Role::Reporter);
    assert!(matches!(
        tracker.members().join(&b, project.id),
        Err(TrackerError::AlreadyMember { .. })
    ));

    // B reports.
    let bug = tracker
        .bugs()
        .report(
            &b,
            project.id,
            BugReport {
                description: "save button does nothing".to_string(),
                severity: Some(Severity::High),
                priority: None,
                commit_ref: Some("deadbeef".to_string()),
            },
        )
        .unwrap();
    assert_eq!(bug.status, Status::Open);
    assert_eq!(bug.priority, Priority::Normal);
    assert_eq!(bug.reporter_id, b.id);

    // Reporters cannot manage bugs.
    assert!(matches!(
        tracker.bugs().assign(&b, bug.id),
        Err(TrackerError::Forbidden(_))
    ));
    assert!(matches!(
        tracker.bugs().update(&b, bug.id, &BugPatch::default()),
        Err(TrackerError::Forbidden(_))
    ));

    // A claims it.
    let assigned = tracker.bugs().assign(&a, bug.id).unwrap();
    assert_eq!(assigned.status, Status::InProgress);
    assert_eq!(assigned.assignee_id, Some(a.id));
    assert!(matches!(
        tracker.bugs().unassign(&b, bug.id),
        Err(TrackerError::Forbidden(_))
    ));
    assert!(matches!(
        tracker.bugs().resolve(&b, bug.id, None),
        Err(TrackerError::Forbidden(_))
    ));

    // A resolves, then releases the resolved bug.
    let resolved = tracker.bugs().resolve(&a, bug.id, Some("cafebabe")).unwrap();
    assert_eq!(resolved.status, Status::Resolved);
    assert_eq!(resolved.resolution_commit.as_deref(), Some("cafebabe"));
    assert_eq!(resolved.commit_ref.as_deref(), Some("deadbeef"));

    let reopened = tracker.bugs().unassign(&a, bug.id).unwrap();
    assert_eq!(reopened.status, Status::Open);
    assert_eq!(reopened.assignee_id, None);

    // Listings reflect the final state.
    let listed = tracker.bugs().list(project.id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], tracker.bugs().get(bug.id).unwrap());

    let members = tracker.members().members_of(project.id).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].role, Role::Elevated);
    assert_eq!(members[1].user.id, b.id);

    let mine = tracker.members().projects_of(a.id).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].my_role, Role::Elevated);
}

#[test]
fn scenario_on_memory_store() {
    run_scenario(&MemoryStore::new());
}

#[test]
fn scenario_on_in_memory_sqlite() {
    run_scenario(&SqliteStore::open_in_memory().unwrap());
}

#[test]
fn scenario_on_file_sqlite_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bugtrack.db");
    run_scenario(&SqliteStore::open(&path, std::time::Duration::from_secs(5)).unwrap());

    let reopened = SqliteStore::open(&path, std::time::Duration::from_secs(5)).unwrap();
    let tracker = Tracker::new(&reopened);
    let a = tracker.identity().authenticate("a@example.com", "a-secret").unwrap();
    let projects = tracker.members().projects_of(a.id).unwrap();
    assert_eq!(projects.len(), 1);
    let bugs = tracker.bugs().list(projects[0].project.id).unwrap();
    assert_eq!(bugs[0].status, Status::Open);
    assert_eq!(bugs[0].resolution_commit.as_deref(), Some("cafebabe"));
}

#[test]
fn bugs_list_newest_first() {
    let store = MemoryStore::new();
    let tracker = Tracker::new(&store);
    let a = tracker.identity().register("A", "a@example.com", "pw").unwrap();
    let project = tracker.projects().create(&a, "P", "repo", None).unwrap();
    let first = tracker.bugs().report(&a, project.id, BugReport::new("one")).unwrap();
    let second = tracker.bugs().report(&a, project.id, BugReport::new("two")).unwrap();

    let ids: Vec<_> = tracker
        .bugs()
        .list(project.id)
        .unwrap()
        .into_iter()
        .map(|bug| bug.id)
        .collect();
    assert_eq!(ids, [second.id, first.id]);
}
