use super::{BugId, ParseEnumError, ProjectId, UserId, normalize};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How badly a defect hurts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// How soon a defect must be fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    Urgent,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::Normal => "Normal",
            Self::Low => "Low",
        }
    }
}

/// The three lifecycle states a bug can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Resolved,
}

/// Guided lifecycle actions. Field updates are not actions; they bypass
/// the table entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Assign,
    Unassign,
    Resolve,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Resolved => "RESOLVED",
        }
    }

    /// Status after `action` is applied.
    ///
    /// Every action has a fixed target regardless of the current status:
    /// - `assign -> in_progress`
    /// - `unassign -> open`
    /// - `resolve -> resolved`
    ///
    /// Whether the action is permitted at all is decided by the policy
    /// (role and assignee identity), never by the current status.
    #[must_use]
    pub const fn after(self, action: Action) -> Self {
        match action {
            Action::Assign => Self::InProgress,
            Action::Unassign => Self::Open,
            Action::Resolve => Self::Resolved,
        }
    }

    /// Whether `(self, action)` is a row of the guided transition table:
    ///
    /// - `open -> assign -> in_progress`
    /// - `in_progress -> assign -> in_progress` (re-confirm)
    /// - `in_progress -> unassign -> open`
    /// - `in_progress -> resolve -> resolved`
    ///
    /// Off-table moves (e.g. unassigning a resolved bug) are still applied
    /// when the assignee guard passes; callers log them.
    #[must_use]
    pub const fn is_guided(self, action: Action) -> bool {
        matches!(
            (self, action),
            (Self::Open | Self::InProgress, Action::Assign)
                | (Self::InProgress, Action::Unassign | Action::Resolve)
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assign => "assign",
            Self::Unassign => "unassign",
            Self::Resolve => "resolve",
        })
    }
}

/// A reported defect with its full lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    pub id: BugId,
    pub project_id: ProjectId,
    pub description: String,
    pub severity: Severity,
    pub priority: Priority,
    pub status: Status,
    pub reporter_id: UserId,
    pub assignee_id: Option<UserId>,
    pub commit_ref: Option<String>,
    pub resolution_commit: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// Insert payload for a freshly reported bug. Always starts open and
/// unassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBug {
    pub project_id: ProjectId,
    pub description: String,
    pub severity: Severity,
    pub priority: Priority,
    pub reporter_id: UserId,
    pub commit_ref: Option<String>,
}

/// Administrative field overwrite. `None` leaves a field untouched; for
/// nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugPatch {
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub assignee_id: Option<Option<UserId>>,
    pub commit_ref: Option<Option<String>>,
    pub resolution_commit: Option<Option<String>>,
}

impl BugPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.severity.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.assignee_id.is_none()
            && self.commit_ref.is_none()
            && self.resolution_commit.is_none()
    }

    /// Overwrite every provided field on `bug`, verbatim.
    pub fn apply_to(&self, bug: &mut Bug) {
        if let Some(description) = &self.description {
            bug.description.clone_from(description);
        }
        if let Some(severity) = self.severity {
            bug.severity = severity;
        }
        if let Some(priority) = self.priority {
            bug.priority = priority;
        }
        if let Some(status) = self.status {
            bug.status = status;
        }
        if let Some(assignee) = self.assignee_id {
            bug.assignee_id = assignee;
        }
        if let Some(commit) = &self.commit_ref {
            bug.commit_ref.clone_from(commit);
        }
        if let Some(commit) = &self.resolution_commit {
            bug.resolution_commit.clone_from(commit);
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ParseEnumError {
                expected: "severity",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "urgent" => Ok(Self::Urgent),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "open" => Ok(Self::Open),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}
