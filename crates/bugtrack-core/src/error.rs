use crate::model::{ProjectId, UserId};
use std::fmt;
use thiserror::Error;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unauthenticated,
    NotInitialized,
    ConfigParseError,
    AlreadyInitialized,
    NotFound,
    Forbidden,
    Conflict,
    AlreadyMember,
    InvalidInput,
    StorageFailure,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unauthenticated => "E1001",
            Self::NotInitialized => "E1002",
            Self::ConfigParseError => "E1003",
            Self::AlreadyInitialized => "E1004",
            Self::NotFound => "E2001",
            Self::Forbidden => "E2002",
            Self::Conflict => "E2003",
            Self::AlreadyMember => "E2004",
            Self::InvalidInput => "E2005",
            Self::StorageFailure => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short snake_case key used in JSON error envelopes.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NotInitialized => "not_initialized",
            Self::ConfigParseError => "config_parse_error",
            Self::AlreadyInitialized => "already_initialized",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::AlreadyMember => "already_member",
            Self::InvalidInput => "invalid_input",
            Self::StorageFailure => "storage_failure",
            Self::LockContention => "lock_contention",
            Self::InternalUnexpected => "internal_unexpected",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "No acting user could be resolved",
            Self::NotInitialized => "Tracker not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::AlreadyInitialized => "Tracker already initialized",
            Self::NotFound => "Referenced entity not found",
            Self::Forbidden => "Insufficient role or ownership",
            Self::Conflict => "Operation conflicts with current state",
            Self::AlreadyMember => "Already a project member",
            Self::InvalidInput => "Missing or invalid input",
            Self::StorageFailure => "Storage backend failure",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => {
                Some("Pass --user, set BUGTRACK_USER, or run `bt login` to pick an identity.")
            }
            Self::NotInitialized => Some("Run `bt init` to create a tracker in this directory."),
            Self::ConfigParseError => Some("Fix syntax in .bugtrack/config.toml and retry."),
            Self::AlreadyInitialized => {
                Some("Run `bt init --force` to rewrite config.toml; the store is kept.")
            }
            Self::NotFound => Some("Check the id with `bt project list` or `bt bug list`."),
            Self::Forbidden => {
                Some("Only elevated members manage bugs; only the assignee may resolve or unassign.")
            }
            Self::Conflict => Some("Another member holds this bug; ask them to unassign first."),
            Self::AlreadyMember => None,
            Self::InvalidInput => Some("Provide every required field with a non-empty value."),
            Self::StorageFailure => Some("Check disk space and permissions on .bugtrack/."),
            Self::LockContention => Some("Retry after the other `bt` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Entity kinds that can be referenced by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Project,
    Bug,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Bug => "bug",
        })
    }
}

/// Typed failure returned by every tracker operation.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("user {user} is already a member of project {project}")]
    AlreadyMember { user: UserId, project: ProjectId },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl TrackerError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated(_) => ErrorCode::Unauthenticated,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::AlreadyMember { .. } => ErrorCode::AlreadyMember,
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
