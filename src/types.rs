//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity-provider group granting tenant administration
pub const ADMIN_GROUP: &str = "Admin";
/// Identity-provider group granting office management
pub const MANAGER_GROUP: &str = "Manager";

/// Effective role surfaced to clients after login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device connectivity as last reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

/// Which tenant entity an update targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateTarget {
    Office,
    Manager,
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateTarget::Office => f.write_str("OFFICE"),
            UpdateTarget::Manager => f.write_str("MANAGER"),
        }
    }
}

impl FromStr for UpdateTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFFICE" => Ok(UpdateTarget::Office),
            "MANAGER" => Ok(UpdateTarget::Manager),
            other => Err(format!("Invalid target '{}'. Must be OFFICE or MANAGER", other)),
        }
    }
}
