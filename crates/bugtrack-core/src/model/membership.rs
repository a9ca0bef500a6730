use super::{ParseEnumError, ProjectId, UserId, normalize};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Project role. A flat tag on the membership row; the two capability sets
/// are decided by the policy module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May modify the project and manage bug assignment and fields.
    Elevated,
    /// May only report bugs.
    Reporter,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elevated => "elevated",
            Self::Reporter => "reporter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "elevated" => Ok(Self::Elevated),
            "reporter" => Ok(Self::Reporter),
            // legacy short names
            "mp" => Ok(Self::Elevated),
            "tst" => Ok(Self::Reporter),
            _ => Err(ParseEnumError {
                expected: "role",
                got: s.to_string(),
            }),
        }
    }
}

/// The fact that `user_id` holds `role` in `project_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub role: Role,
    pub created_at_us: i64,
}
