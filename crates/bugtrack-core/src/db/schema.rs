//! Tracker tables and the ordered list of schema steps that build them.
//!
//! `memberships` is keyed by `(user_id, project_id)`, which is what keeps
//! one role per pair. Enum columns on `bugs` are CHECK-constrained so no
//! write can leave a bug outside the three statuses. The applied version
//! lives in `PRAGMA user_version`.

/// One forward-only schema step.
#[derive(Debug, Clone, Copy)]
pub struct SchemaStep {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const CORE_TABLES: &str = r"
CREATE TABLE users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    email TEXT NOT NULL UNIQUE CHECK (length(trim(email)) > 0),
    credential_salt TEXT NOT NULL,
    credential_digest TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE projects (
    project_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    repository TEXT NOT NULL,
    description TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE memberships (
    user_id INTEGER NOT NULL REFERENCES users(user_id),
    project_id INTEGER NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK (role IN ('elevated', 'reporter')),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (user_id, project_id)
);

CREATE TABLE bugs (
    bug_id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    severity TEXT NOT NULL DEFAULT 'Medium' CHECK (severity IN ('High', 'Medium', 'Low')),
    priority TEXT NOT NULL DEFAULT 'Normal' CHECK (priority IN ('Urgent', 'Normal', 'Low')),
    status TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'IN_PROGRESS', 'RESOLVED')),
    reporter_id INTEGER NOT NULL REFERENCES users(user_id),
    assignee_id INTEGER REFERENCES users(user_id),
    commit_ref TEXT,
    resolution_commit TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);
";

const LISTING_INDEXES: &str = r"
CREATE INDEX idx_memberships_project ON memberships(project_id, created_at_us);
CREATE INDEX idx_bugs_project_created ON bugs(project_id, created_at_us DESC);
CREATE INDEX idx_bugs_assignee ON bugs(assignee_id, status);
";

/// Every schema step, ascending by version.
pub const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "core tables",
        sql: CORE_TABLES,
    },
    SchemaStep {
        version: 2,
        name: "listing indexes",
        sql: LISTING_INDEXES,
    },
];

/// Highest version this build knows how to produce.
pub const LATEST_VERSION: u32 = 2;

/// Indexes the listing queries rely on.
pub const LISTING_INDEX_NAMES: &[&str] = &[
    "idx_memberships_project",
    "idx_bugs_project_created",
    "idx_bugs_assignee",
];
