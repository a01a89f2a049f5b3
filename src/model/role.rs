use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Stored in `users.role` as its snake_case name.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Clerk,
}

impl Role {
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn can_manage(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}
