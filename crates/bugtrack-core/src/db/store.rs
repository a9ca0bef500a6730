//! [`Store`] implementation over a single SQLite connection.

use super::{DEFAULT_BUSY_TIMEOUT, migrations};
use crate::error::{Result, TrackerError};
use crate::model::{
    Bug, BugId, BugPatch, Credential, Membership, NewBug, NewProject, NewUser, Priority, Project,
    ProjectId, ProjectPatch, Role, Severity, Status, User, UserId, now_us,
};
use crate::store::{CasOutcome, Store, Transition};
use anyhow::Context as _;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, types::Type};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const USER_COLUMNS: &str =
    "user_id, name, email, credential_salt, credential_digest, created_at_us";
const PROJECT_COLUMNS: &str =
    "project_id, name, repository, description, created_at_us, updated_at_us";
const MEMBERSHIP_COLUMNS: &str = "user_id, project_id, role, created_at_us";
const BUG_COLUMNS: &str = "bug_id, project_id, description, severity, priority, status, \
     reporter_id, assignee_id, commit_ref, resolution_commit, created_at_us, updated_at_us";

/// Tracker store persisted in SQLite.
///
/// The connection is serialized behind a mutex; cross-process exclusivity
/// comes from SQLite's own write lock. Every conditional write (assign
/// compare-and-set, field patches) is one `UPDATE` inside an immediate
/// transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at `path`, creating the file and its parent
    /// directory if needed, and migrate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, busy_timeout: Duration) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open store database {}", path.display()))?;
        Self::prepare(conn, busy_timeout)
    }

    /// Fresh, migrated in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::prepare(Connection::open_in_memory()?, DEFAULT_BUSY_TIMEOUT)
    }

    /// Shared setup for every connection. In-memory databases report
    /// `memory` for the journal mode and keep it.
    fn prepare(mut conn: Connection, busy_timeout: Duration) -> anyhow::Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        let version = migrations::migrate(&mut conn).context("migrate store schema")?;
        tracing::debug!(journal = %mode, version, "opened sqlite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }


    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrackerError::Storage("sqlite connection mutex poisoned".to_string()))
    }
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        credential: Credential {
            salt: row.get(3)?,
            digest: row.get(4)?,
        },
        created_at_us: row.get(5)?,
    })
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId(row.get(0)?),
        name: row.get(1)?,
        repository: row.get(2)?,
        description: row.get(3)?,
        created_at_us: row.get(4)?,
        updated_at_us: row.get(5)?,
    })
}

fn row_to_membership(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        user_id: UserId(row.get(0)?),
        project_id: ProjectId(row.get(1)?),
        role: parse_column::<Role>(row, 2)?,
        created_at_us: row.get(3)?,
    })
}

fn row_to_bug(row: &Row<'_>) -> rusqlite::Result<Bug> {
    Ok(Bug {
        id: BugId(row.get(0)?),
        project_id: ProjectId(row.get(1)?),
        description: row.get(2)?,
        severity: parse_column(row, 3)?,
        priority: parse_column(row, 4)?,
        status: parse_column(row, 5)?,
        reporter_id: UserId(row.get(6)?),
        assignee_id: row.get::<_, Option<i64>>(7)?.map(UserId),
        commit_ref: row.get(8)?,
        resolution_commit: row.get(9)?,
        created_at_us: row.get(10)?,
        updated_at_us: row.get(11)?,
    })
}

/// Split a nullable patch field into "touch the column" and its new value.
fn nullable<T: Clone>(field: Option<&Option<T>>) -> (bool, Option<T>) {
    field.map_or((false, None), |value| (true, value.clone()))
}

fn select_bug(conn: &Connection, id: BugId) -> rusqlite::Result<Option<Bug>> {
    conn.query_row(
        &format!("SELECT {BUG_COLUMNS} FROM bugs WHERE bug_id = ?1"),
        params![id.0],
        row_to_bug,
    )
    .optional()
}

impl Store for SqliteStore {
    fn create_user(&self, new: NewUser) -> Result<Option<User>> {
        let conn = self.lock()?;
        let ts = now_us();
        let inserted = conn.execute(
            "INSERT INTO users (name, email, credential_salt, credential_digest, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(email) DO NOTHING",
            params![
                new.name,
                new.email,
                new.credential.salt,
                new.credential.digest,
                ts
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(User {
            id: UserId(conn.last_insert_rowid()),
            name: new.name,
            email: new.email,
            credential: new.credential,
            created_at_us: ts,
        }))
    }

    fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![id.0],
                row_to_user,
            )
            .optional()?)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()?)
    }

    fn update_credential(&self, id: UserId, credential: &Credential) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE users SET credential_salt = ?1, credential_digest = ?2 WHERE user_id = ?3",
            params![credential.salt, credential.digest, id.0],
        )?;
        Ok(changed > 0)
    }

    fn create_project(&self, new: NewProject, creator: UserId) -> Result<(Project, Membership)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let ts = now_us();
        tx.execute(
            "INSERT INTO projects (name, repository, description, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![new.name, new.repository, new.description, ts],
        )?;
        let id = ProjectId(tx.last_insert_rowid());
        tx.execute(
            "INSERT INTO memberships (user_id, project_id, role, created_at_us)
             VALUES (?1, ?2, ?3, ?4)",
            params![creator.0, id.0, Role::Elevated.as_str(), ts],
        )?;
        tx.commit()?;

        Ok((
            Project {
                id,
                name: new.name,
                repository: new.repository,
                description: new.description,
                created_at_us: ts,
                updated_at_us: ts,
            },
            Membership {
                user_id: creator,
                project_id: id,
                role: Role::Elevated,
                created_at_us: ts,
            },
        ))
    }

    fn find_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1"),
                params![id.0],
                row_to_project,
            )
            .optional()?)
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY project_id"))?;
        let rows = stmt.query_map([], row_to_project)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn patch_project(&self, id: ProjectId, patch: &ProjectPatch) -> Result<Option<Project>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (set_description, description) = nullable(patch.description.as_ref());
        let changed = tx.execute(
            "UPDATE projects SET
                name = COALESCE(?1, name),
                repository = COALESCE(?2, repository),
                description = CASE WHEN ?3 THEN ?4 ELSE description END,
                updated_at_us = ?5
             WHERE project_id = ?6",
            params![
                patch.name,
                patch.repository,
                set_description,
                description,
                now_us(),
                id.0
            ],
        )?;
        let project = if changed == 0 {
            None
        } else {
            tx.query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1"),
                params![id.0],
                row_to_project,
            )
            .optional()?
        };
        tx.commit()?;
        Ok(project)
    }

    fn find_membership(&self, user: UserId, project: ProjectId) -> Result<Option<Membership>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
                     WHERE user_id = ?1 AND project_id = ?2"
                ),
                params![user.0, project.0],
                row_to_membership,
            )
            .optional()?)
    }

    fn insert_membership(&self, membership: &Membership) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO memberships (user_id, project_id, role, created_at_us)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, project_id) DO NOTHING",
            params![
                membership.user_id.0,
                membership.project_id.0,
                membership.role.as_str(),
                membership.created_at_us
            ],
        )?;
        Ok(inserted > 0)
    }

    fn memberships_of_project(&self, project: ProjectId) -> Result<Vec<Membership>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE project_id = ?1
             ORDER BY created_at_us, user_id"
        ))?;
        let rows = stmt.query_map(params![project.0], row_to_membership)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn memberships_of_user(&self, user: UserId) -> Result<Vec<Membership>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE user_id = ?1
             ORDER BY project_id"
        ))?;
        let rows = stmt.query_map(params![user.0], row_to_membership)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_bug(&self, new: NewBug) -> Result<Bug> {
        let conn = self.lock()?;
        let ts = now_us();
        conn.execute(
            "INSERT INTO bugs (
                project_id, description, severity, priority, status,
                reporter_id, assignee_id, commit_ref, resolution_commit,
                created_at_us, updated_at_us
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, NULL, ?8, ?8)",
            params![
                new.project_id.0,
                new.description,
                new.severity.as_str(),
                new.priority.as_str(),
                Status::Open.as_str(),
                new.reporter_id.0,
                new.commit_ref,
                ts
            ],
        )?;
        Ok(Bug {
            id: BugId(conn.last_insert_rowid()),
            project_id: new.project_id,
            description: new.description,
            severity: new.severity,
            priority: new.priority,
            status: Status::Open,
            reporter_id: new.reporter_id,
            assignee_id: None,
            commit_ref: new.commit_ref,
            resolution_commit: None,
            created_at_us: ts,
            updated_at_us: ts,
        })
    }

    fn find_bug(&self, id: BugId) -> Result<Option<Bug>> {
        let conn = self.lock()?;
        Ok(select_bug(&conn, id)?)
    }

    fn bugs_of_project(&self, project: ProjectId) -> Result<Vec<Bug>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BUG_COLUMNS} FROM bugs
             WHERE project_id = ?1
             ORDER BY created_at_us DESC, bug_id DESC"
        ))?;
        let rows = stmt.query_map(params![project.0], row_to_bug)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn patch_bug(&self, id: BugId, patch: &BugPatch) -> Result<Option<Bug>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (set_assignee, assignee) = nullable(patch.assignee_id.as_ref());
        let (set_commit, commit) = nullable(patch.commit_ref.as_ref());
        let (set_resolution, resolution) = nullable(patch.resolution_commit.as_ref());
        let changed = tx.execute(
            "UPDATE bugs SET
                description = COALESCE(?1, description),
                severity = COALESCE(?2, severity),
                priority = COALESCE(?3, priority),
                status = COALESCE(?4, status),
                assignee_id = CASE WHEN ?5 THEN ?6 ELSE assignee_id END,
                commit_ref = CASE WHEN ?7 THEN ?8 ELSE commit_ref END,
                resolution_commit = CASE WHEN ?9 THEN ?10 ELSE resolution_commit END,
                updated_at_us = ?11
             WHERE bug_id = ?12",
            params![
                patch.description,
                patch.severity.map(Severity::as_str),
                patch.priority.map(Priority::as_str),
                patch.status.map(Status::as_str),
                set_assignee,
                assignee.map(|u| u.0),
                set_commit,
                commit,
                set_resolution,
                resolution,
                now_us(),
                id.0
            ],
        )?;
        let bug = if changed == 0 {
            None
        } else {
            select_bug(&tx, id)?
        };
        tx.commit()?;
        Ok(bug)
    }

    fn transition_bug(&self, id: BugId, transition: &Transition) -> Result<CasOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (touch_resolution, resolution) = match &transition.resolution_commit {
            Some(commit) => (true, commit.clone()),
            None => (false, None),
        };
        let changed = tx.execute(
            "UPDATE bugs SET
                assignee_id = ?1,
                status = ?2,
                resolution_commit = CASE WHEN ?3 THEN ?4 ELSE resolution_commit END,
                updated_at_us = ?5
             WHERE bug_id = ?6 AND assignee_id IS ?7",
            params![
                transition.assignee.map(|u| u.0),
                transition.status.as_str(),
                touch_resolution,
                resolution,
                now_us(),
                id.0,
                transition.expected_assignee.map(|u| u.0)
            ],
        )?;

        let current = select_bug(&tx, id)?;
        tx.commit()?;

        Ok(match (changed, current) {
            (_, None) => CasOutcome::Missing,
            (0, Some(bug)) => CasOutcome::Stale {
                current: bug.assignee_id,
            },
            (_, Some(bug)) => CasOutcome::Applied(bug),
        })
    }
}
