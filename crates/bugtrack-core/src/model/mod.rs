//! Domain records: users, projects, memberships, and bugs.

pub mod bug;
pub mod membership;
pub mod project;
pub mod user;

pub use bug::{Action, Bug, BugPatch, NewBug, Priority, Severity, Status};
pub use membership::{Membership, Role};
pub use project::{NewProject, Project, ProjectPatch};
pub use user::{Credential, NewUser, User};

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
                digits.parse::<i64>().map(Self).map_err(|_| ParseEnumError {
                    expected: $label,
                    got: s.to_string(),
                })
            }
        }
    };
}

id_type!(
    /// Identity Store key.
    UserId,
    "user id"
);
id_type!(
    /// Project key.
    ProjectId,
    "project id"
);
id_type!(
    /// Bug key, unique across projects.
    BugId,
    "bug id"
);

/// Error returned when parsing an enum or id from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

pub(crate) fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

/// Wall-clock timestamp in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::{BugId, ProjectId, UserId};
    use std::str::FromStr;

    #[test]
    fn ids_parse_with_optional_hash() {
        assert_eq!(BugId::from_str("#12").unwrap(), BugId(12));
        assert_eq!(ProjectId::from_str(" 4 ").unwrap(), ProjectId(4));
        assert!(UserId::from_str("alice").is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&UserId(9)).unwrap(), "9");
        assert_eq!(serde_json::from_str::<BugId>("3").unwrap(), BugId(3));
    }
}
