//! Racing elevated members on one unassigned bug: exactly one claim wins.

use bugtrack_core::Tracker;
use bugtrack_core::db::SqliteStore;
use bugtrack_core::error::TrackerError;
use bugtrack_core::lifecycle::BugReport;
use bugtrack_core::model::{BugId, Membership, ProjectId, Role, Status, User};
use bugtrack_core::store::{MemoryStore, Store};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const RACERS: usize = 8;

/// Seed one project with `RACERS` elevated members and a single open bug.
fn seed(store: &dyn Store) -> (Vec<User>, ProjectId, BugId) {
    let tracker = Tracker::new(store);
    let owner = tracker
        .identity()
        .register("owner", "owner@example.com", "pw")
        .unwrap();
    let project = tracker.projects().create(&owner, "P", "repo", None).unwrap();

    let mut racers = vec![owner];
    for i in 1..RACERS {
        let user = tracker
            .identity()
            .register(&format!("racer{i}"), &format!("racer{i}@example.com"), "pw")
            .unwrap();
        assert!(
            store
                .insert_membership(&Membership {
                    user_id: user.id,
                    project_id: project.id,
                    role: Role::Elevated,
                    created_at_us: 0,
                })
                .unwrap()
        );
        racers.push(user);
    }

    let bug = tracker
        .bugs()
        .report(&racers[0], project.id, BugReport::new("race me"))
        .unwrap();
    (racers, project.id, bug.id)
}

fn tally(results: Vec<(User, Result<(), TrackerError>)>) -> User {
    let mut winners = Vec::new();
    for (user, result) in results {
        match result {
            Ok(()) => winners.push(user),
            Err(TrackerError::Conflict(_)) => {}
            Err(other) => panic!("unexpected failure for {}: {other}", user.email),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one racer must win the claim");
    winners.remove(0)
}

#[test]
fn assign_race_on_memory_store() {
    let store = Arc::new(MemoryStore::new());
    let (racers, _, bug) = seed(store.as_ref());
    let barrier = Arc::new(Barrier::new(RACERS));

    let handles: Vec<_> = racers
        .into_iter()
        .map(|user| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let result = Tracker::new(store.as_ref())
                    .bugs()
                    .assign(&user, bug)
                    .map(|_| ());
                (user, result)
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winner = tally(results);
    let stored = Tracker::new(store.as_ref()).bugs().get(bug).unwrap();
    assert_eq!(stored.assignee_id, Some(winner.id));
    assert_eq!(stored.status, Status::InProgress);
}

#[test]
fn assign_race_across_sqlite_connections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bugtrack.db");
    let seeded = SqliteStore::open(&path, Duration::from_secs(5)).unwrap();
    let (racers, _, bug) = seed(&seeded);
    drop(seeded);

    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = racers
        .into_iter()
        .map(|user| {
            let store = SqliteStore::open(&path, Duration::from_secs(5)).unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let result = Tracker::new(&store).bugs().assign(&user, bug).map(|_| ());
                (user, result)
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winner = tally(results);
    let store = SqliteStore::open(&path, Duration::from_secs(5)).unwrap();
    let stored = Tracker::new(&store).bugs().get(bug).unwrap();
    assert_eq!(stored.assignee_id, Some(winner.id));
    assert_eq!(stored.status, Status::InProgress);
}
