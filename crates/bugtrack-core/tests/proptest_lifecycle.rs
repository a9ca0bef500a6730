//! Property tests over random sequences of lifecycle operations.

use bugtrack_core::Tracker;
use bugtrack_core::error::TrackerError;
use bugtrack_core::lifecycle::BugReport;
use bugtrack_core::model::{Bug, BugId, Membership, Role, Status, User};
use bugtrack_core::store::{MemoryStore, Store};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Assign(usize),
    Unassign(usize),
    Resolve(usize, bool),
    ForceStatus(usize, Status),
}

fn arb_status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Open),
        Just(Status::InProgress),
        Just(Status::Resolved)
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    let actor = 0..4usize;
    prop_oneof![
        actor.clone().prop_map(Op::Assign),
        actor.clone().prop_map(Op::Unassign),
        (actor.clone(), any::<bool>()).prop_map(|(a, c)| Op::Resolve(a, c)),
        (actor, arb_status()).prop_map(|(a, s)| Op::ForceStatus(a, s)),
    ]
}

/// Actors 0 and 1 are elevated, 2 is a reporter, 3 is an outsider.
fn world(store: &MemoryStore) -> (Vec<User>, BugId) {
    let tracker = Tracker::new(store);
    let ids = tracker.identity();
    let users: Vec<User> = (0..4)
        .map(|i| {
            ids.register(&format!("u{i}"), &format!("u{i}@example.com"), "pw")
                .unwrap()
        })
        .collect();
    let project = tracker.projects().create(&users[0], "P", "repo", None).unwrap();
    store
        .insert_membership(&Membership {
            user_id: users[1].id,
            project_id: project.id,
            role: Role::Elevated,
            created_at_us: 0,
        })
        .unwrap();
    tracker.members().join(&users[2], project.id).unwrap();
    let bug = tracker
        .bugs()
        .report(&users[2], project.id, BugReport::new("flaky"))
        .unwrap();
    (users, bug.id)
}

const fn is_elevated(actor: usize) -> bool {
    actor < 2
}

fn check(
    users: &[User],
    before: &Bug,
    op: Op,
    result: Result<Bug, TrackerError>,
) -> Result<(), TestCaseError> {
    match op {
        Op::Assign(a) => {
            let actor = users[a].id;
            match (is_elevated(a), before.assignee_id) {
                (false, _) => prop_assert!(matches!(result, Err(TrackerError::Forbidden(_)))),
                (true, Some(holder)) if holder != actor => {
                    prop_assert!(matches!(result, Err(TrackerError::Conflict(_))));
                }
                (true, _) => {
                    let bug = result.map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(bug.assignee_id, Some(actor));
                    prop_assert_eq!(bug.status, Status::InProgress);
                }
            }
        }
        Op::Unassign(a) => {
            if before.assignee_id == Some(users[a].id) {
                let bug = result.map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(bug.assignee_id, None);
                prop_assert_eq!(bug.status, Status::Open);
            } else {
                prop_assert!(matches!(result, Err(TrackerError::Forbidden(_))));
            }
        }
        Op::Resolve(a, with_commit) => {
            if before.assignee_id == Some(users[a].id) {
                let bug = result.map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(bug.status, Status::Resolved);
                prop_assert_eq!(bug.resolution_commit.is_some(), with_commit);
            } else {
                prop_assert!(matches!(result, Err(TrackerError::Forbidden(_))));
            }
        }
        Op::ForceStatus(a, status) => {
            if is_elevated(a) {
                let bug = result.map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(bug.status, status);
                prop_assert_eq!(bug.assignee_id, before.assignee_id);
            } else {
                prop_assert!(matches!(result, Err(TrackerError::Forbidden(_))));
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn decisions_depend_only_on_role_and_assignee(ops in prop::collection::vec(arb_op(), 1..40)) {
        let store = MemoryStore::new();
        let (users, bug_id) = world(&store);
        let tracker = Tracker::new(&store);
        let bugs = tracker.bugs();

        for op in ops {
            let before = bugs.get(bug_id).unwrap();
            let result = match op {
                Op::Assign(a) => bugs.assign(&users[a], bug_id),
                Op::Unassign(a) => bugs.unassign(&users[a], bug_id),
                Op::Resolve(a, c) => bugs.resolve(&users[a], bug_id, c.then_some("abc123")),
                Op::ForceStatus(a, status) => bugs.update(
                    &users[a],
                    bug_id,
                    &bugtrack_core::model::BugPatch {
                        status: Some(status),
                        ..Default::default()
                    },
                ),
            };
            let failed = result.is_err();
            check(&users, &before, op, result)?;

            let after = bugs.get(bug_id).unwrap();
            if failed {
                prop_assert_eq!(&after, &before, "rejected operations must not write");
            }
            prop_assert_eq!(after.reporter_id, users[2].id);
            if let Some(assignee) = after.assignee_id {
                prop_assert!(users[..2].iter().any(|u| u.id == assignee));
            }
        }
    }

    #[test]
    fn assign_is_idempotent(repeats in 1..5usize, actor in 0..2usize) {
        let store = MemoryStore::new();
        let (users, bug_id) = world(&store);
        let bugs = Tracker::new(&store).bugs();

        let first = bugs.assign(&users[actor], bug_id).unwrap();
        for _ in 0..repeats {
            prop_assert_eq!(&bugs.assign(&users[actor], bug_id).unwrap(), &first);
        }
    }
}
